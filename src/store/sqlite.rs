use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::types::ValueRef;
use rusqlite::OptionalExtension;

use crate::db::Database;
use crate::market::symbols;
use crate::models::{
    CreateHoldingInput, CreateTradeInput, Holding, Settings, Trade, TradeFilters, TradeStatus,
    TradeZone, UpdateSettingsInput, UpdateTradeInput,
};
use crate::store::{StoreError, TradeStore, TradeWrite};

const TRADE_COLUMNS: &str = "id, stock_name, cmp, entry, stop_loss, target, remark, trade_type, \
     dv_analysis, trade_zone, trigger_date, exit_date, status, last_alert, created_at, updated_at";

pub struct SqliteStore {
    db: Arc<Database>,
}

/// Numeric columns may contain text in databases imported from spreadsheet
/// exports ("1,234.50", ""). Anything unparseable coerces to 0.0.
fn get_f64_lenient(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<f64> {
    Ok(match row.get_ref(idx)? {
        ValueRef::Real(v) => v,
        ValueRef::Integer(v) => v as f64,
        ValueRef::Text(bytes) => std::str::from_utf8(bytes)
            .ok()
            .map(|s| s.replace(',', ""))
            .and_then(|s| s.trim().parse::<f64>().ok())
            .unwrap_or(0.0),
        _ => 0.0,
    })
}

/// NULL and blank both mean "unset" for the date columns.
fn get_opt_date(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<Option<String>> {
    let value: Option<String> = row.get(idx)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

fn map_row_to_trade(row: &rusqlite::Row) -> rusqlite::Result<Trade> {
    let zone_raw: String = row.get(9)?;
    let trade_zone = TradeZone::parse(&zone_raw).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            9,
            rusqlite::types::Type::Text,
            format!("unknown trade zone: {}", zone_raw).into(),
        )
    })?;

    let status: Option<String> = row.get(12)?;
    let last_alert: Option<String> = row.get(13)?;

    Ok(Trade {
        id: row.get(0)?,
        stock_name: row.get(1)?,
        cmp: get_f64_lenient(row, 2)?,
        entry: get_f64_lenient(row, 3)?,
        stop_loss: get_f64_lenient(row, 4)?,
        target: get_f64_lenient(row, 5)?,
        remark: row.get::<_, Option<String>>(6)?.unwrap_or_default(),
        trade_type: row.get::<_, Option<String>>(7)?.unwrap_or_default(),
        dv_analysis: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
        trade_zone,
        trigger_date: get_opt_date(row, 10)?,
        exit_date: get_opt_date(row, 11)?,
        status: status
            .as_deref()
            .map(TradeStatus::parse_or_default)
            .unwrap_or(TradeStatus::Pending),
        last_alert: last_alert.unwrap_or_default(),
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

impl SqliteStore {
    pub fn new(db: Arc<Database>) -> Self {
        Self { db }
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, rusqlite::Connection>, StoreError> {
        self.db.conn.lock().map_err(|_| StoreError::LockPoisoned)
    }

    // ---- settings -------------------------------------------------------

    pub fn get_settings(&self) -> Result<Settings, StoreError> {
        let conn = self.conn()?;
        let settings = conn.query_row(
            "SELECT id, refresh_interval_secs, auto_refresh_enabled, alerts_enabled, created_at, updated_at
             FROM settings WHERE id = 1",
            [],
            |row| {
                Ok(Settings {
                    id: row.get(0)?,
                    refresh_interval_secs: row.get(1)?,
                    auto_refresh_enabled: row.get::<_, i32>(2)? == 1,
                    alerts_enabled: row.get::<_, i32>(3)? == 1,
                    created_at: row.get(4)?,
                    updated_at: row.get(5)?,
                })
            },
        )?;
        Ok(settings)
    }

    pub fn update_settings(&self, input: &UpdateSettingsInput) -> Result<Settings, StoreError> {
        {
            let conn = self.conn()?;

            let mut updates = Vec::new();
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

            if let Some(val) = input.refresh_interval_secs {
                updates.push("refresh_interval_secs = ?");
                values.push(Box::new(val));
            }
            if let Some(val) = input.auto_refresh_enabled {
                updates.push("auto_refresh_enabled = ?");
                values.push(Box::new(val as i32));
            }
            if let Some(val) = input.alerts_enabled {
                updates.push("alerts_enabled = ?");
                values.push(Box::new(val as i32));
            }

            updates.push("updated_at = strftime('%s', 'now')");

            let query = format!("UPDATE settings SET {} WHERE id = 1", updates.join(", "));
            let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            conn.execute(&query, params.as_slice())?;
        }

        self.get_settings()
    }

    // ---- portfolio holdings ---------------------------------------------

    pub fn list_holdings(&self) -> Result<Vec<Holding>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, stock_name, date, stop_loss, target, actual_cost FROM holdings ORDER BY id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Holding {
                id: row.get(0)?,
                stock_name: row.get(1)?,
                date: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                stop_loss: get_f64_lenient(row, 3)?,
                target: get_f64_lenient(row, 4)?,
                actual_cost: get_f64_lenient(row, 5)?,
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }

    pub fn create_holding(&self, input: &CreateHoldingInput) -> Result<Holding, StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO holdings (stock_name, date, stop_loss, target, actual_cost)
             VALUES (?, ?, ?, ?, ?)",
            rusqlite::params![
                input.stock_name.trim().to_uppercase(),
                input.date,
                input.stop_loss,
                input.target,
                input.actual_cost
            ],
        )?;
        let id = conn.last_insert_rowid();
        Ok(Holding {
            id,
            stock_name: input.stock_name.trim().to_uppercase(),
            date: input.date.clone(),
            stop_loss: input.stop_loss,
            target: input.target,
            actual_cost: input.actual_cost,
        })
    }

    pub fn delete_holding(&self, stock_name: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM holdings WHERE stock_name = ?", [stock_name])?;
        Ok(())
    }

    // ---- reference links ------------------------------------------------

    /// Symbol -> fundamentals URL, keyed by the normalized symbol.
    pub fn link_map(&self) -> Result<HashMap<String, String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT stock_name, link FROM links")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut map = HashMap::new();
        for row in rows {
            let (name, link) = row?;
            map.insert(symbols::normalize(&name), link);
        }
        Ok(map)
    }

    pub fn set_link(&self, stock_name: &str, link: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO links (stock_name, link) VALUES (?, ?)
             ON CONFLICT(stock_name) DO UPDATE SET link = excluded.link",
            [stock_name, link],
        )?;
        Ok(())
    }
}

impl TradeStore for SqliteStore {
    fn list(&self, filters: &TradeFilters) -> Result<Vec<Trade>, StoreError> {
        let conn = self.conn()?;

        let mut query = format!("SELECT {} FROM trades WHERE 1=1", TRADE_COLUMNS);
        let mut conditions = Vec::new();
        let mut params: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();

        if let Some(status) = filters.status {
            // Legacy rows with NULL / blank status count as Pending.
            if status == TradeStatus::Pending {
                conditions.push("COALESCE(NULLIF(TRIM(status), ''), 'Pending') = ?");
            } else {
                conditions.push("status = ?");
            }
            params.push(Box::new(status.as_str().to_string()));
        }
        if let Some(zone) = filters.trade_zone {
            conditions.push("trade_zone = ?");
            params.push(Box::new(zone.as_str().to_string()));
        }
        if let Some(trade_type) = &filters.trade_type {
            conditions.push("trade_type = ?");
            params.push(Box::new(trade_type.clone()));
        }

        if !conditions.is_empty() {
            query.push_str(&format!(" AND {}", conditions.join(" AND ")));
        }
        query.push_str(" ORDER BY id");

        let param_refs: Vec<&dyn rusqlite::ToSql> = params.iter().map(|p| p.as_ref()).collect();
        let mut stmt = conn.prepare(&query)?;
        let trades_iter = stmt.query_map(param_refs.as_slice(), map_row_to_trade)?;

        Ok(trades_iter.collect::<Result<Vec<_>, _>>()?)
    }

    fn list_open(&self) -> Result<Vec<Trade>, StoreError> {
        let conn = self.conn()?;
        let query = format!(
            "SELECT {} FROM trades
             WHERE COALESCE(status, '') NOT IN ('Target-Hit', 'SL-Hit')
             ORDER BY id",
            TRADE_COLUMNS
        );
        let mut stmt = conn.prepare(&query)?;
        let trades_iter = stmt.query_map([], map_row_to_trade)?;
        Ok(trades_iter.collect::<Result<Vec<_>, _>>()?)
    }

    fn get(&self, id: i64) -> Result<Option<Trade>, StoreError> {
        let conn = self.conn()?;
        let query = format!("SELECT {} FROM trades WHERE id = ?", TRADE_COLUMNS);
        let trade = conn
            .query_row(&query, [id], map_row_to_trade)
            .optional()?;
        Ok(trade)
    }

    fn create(&self, input: &CreateTradeInput) -> Result<Trade, StoreError> {
        let id = {
            let conn = self.conn()?;
            let now = Utc::now().timestamp();

            let stock_name = input.stock_name.trim().to_uppercase();
            let chart_url = symbols::chart_url(&stock_name);

            conn.execute(
                "INSERT INTO trades (
                    stock_name, cmp, entry, stop_loss, target, remark, trade_type,
                    dv_analysis, trade_zone, trigger_date, exit_date, status, last_alert,
                    created_at, updated_at
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, NULL, NULL, 'Pending', '', ?, ?)",
                rusqlite::params![
                    stock_name,
                    input.cmp,
                    input.entry,
                    input.stop_loss,
                    input.target,
                    input.remark,
                    input.trade_type,
                    chart_url,
                    input.trade_zone.as_str(),
                    now,
                    now
                ],
            )?;

            conn.last_insert_rowid()
        };

        self.get(id)?.ok_or(StoreError::NotFound(id))
    }

    fn update(&self, id: i64, input: &UpdateTradeInput) -> Result<Trade, StoreError> {
        {
            let conn = self.conn()?;
            let now = Utc::now().timestamp();

            // Build dynamic UPDATE query based on provided fields
            let mut updates = vec!["updated_at = ?"];
            let mut values: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(now)];

            if let Some(stock_name) = &input.stock_name {
                let stock_name = stock_name.trim().to_uppercase();
                updates.push("dv_analysis = ?");
                values.push(Box::new(symbols::chart_url(&stock_name)));
                updates.push("stock_name = ?");
                values.push(Box::new(stock_name));
            }
            if let Some(cmp) = input.cmp {
                updates.push("cmp = ?");
                values.push(Box::new(cmp));
            }
            if let Some(entry) = input.entry {
                updates.push("entry = ?");
                values.push(Box::new(entry));
            }
            if let Some(stop_loss) = input.stop_loss {
                updates.push("stop_loss = ?");
                values.push(Box::new(stop_loss));
            }
            if let Some(target) = input.target {
                updates.push("target = ?");
                values.push(Box::new(target));
            }
            if let Some(remark) = &input.remark {
                updates.push("remark = ?");
                values.push(Box::new(remark.clone()));
            }
            if let Some(trade_type) = &input.trade_type {
                updates.push("trade_type = ?");
                values.push(Box::new(trade_type.clone()));
            }
            if let Some(zone) = input.trade_zone {
                updates.push("trade_zone = ?");
                values.push(Box::new(zone.as_str().to_string()));
            }

            let query = format!("UPDATE trades SET {} WHERE id = ?", updates.join(", "));
            values.push(Box::new(id));

            let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            let affected = conn.execute(&query, params.as_slice())?;
            if affected == 0 {
                return Err(StoreError::NotFound(id));
            }
        }

        self.get(id)?.ok_or(StoreError::NotFound(id))
    }

    fn delete(&self, id: i64) -> Result<(), StoreError> {
        let conn = self.conn()?;
        // Deleting an already-deleted id is a no-op
        conn.execute("DELETE FROM trades WHERE id = ?", [id])?;
        Ok(())
    }

    fn batch_apply(&self, writes: &[TradeWrite]) -> Result<(), StoreError> {
        if writes.is_empty() {
            return Ok(());
        }

        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let now = Utc::now().timestamp();

        for write in writes {
            let mut updates = vec!["cmp = ?", "updated_at = ?"];
            let mut values: Vec<Box<dyn rusqlite::ToSql>> =
                vec![Box::new(write.cmp), Box::new(now)];

            if let Some(status) = write.status {
                updates.push("status = ?");
                values.push(Box::new(status.as_str().to_string()));
            }
            if let Some(trigger_date) = &write.trigger_date {
                updates.push("trigger_date = ?");
                values.push(Box::new(trigger_date.clone()));
            }
            if let Some(exit_date) = &write.exit_date {
                updates.push("exit_date = ?");
                values.push(Box::new(exit_date.clone()));
            }

            let query = format!("UPDATE trades SET {} WHERE id = ?", updates.join(", "));
            values.push(Box::new(write.id));

            let params: Vec<&dyn rusqlite::ToSql> = values.iter().map(|v| v.as_ref()).collect();
            tx.execute(&query, params.as_slice())?;
        }

        tx.commit()?;
        Ok(())
    }

    fn set_last_alert(&self, id: i64, label: &str) -> Result<(), StoreError> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE trades SET last_alert = ? WHERE id = ?",
            rusqlite::params![label, id],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::TradeZone;

    fn test_store() -> SqliteStore {
        let db = Database::open_in_memory().expect("in-memory db");
        SqliteStore::new(Arc::new(db))
    }

    fn demand_input(stock: &str) -> CreateTradeInput {
        CreateTradeInput {
            stock_name: stock.to_string(),
            cmp: 105.0,
            entry: 100.0,
            stop_loss: 90.0,
            target: 120.0,
            remark: "weekly demand zone".to_string(),
            trade_type: "WIT".to_string(),
            trade_zone: TradeZone::Demand,
        }
    }

    #[test]
    fn test_create_assigns_monotonic_ids_and_pending_status() {
        let store = test_store();

        let first = store.create(&demand_input("TCS")).unwrap();
        let second = store.create(&demand_input("INFY")).unwrap();

        assert!(second.id > first.id);
        assert_eq!(first.status, TradeStatus::Pending);
        assert_eq!(first.last_alert, "");
        assert_eq!(first.trigger_date, None);
        assert_eq!(first.exit_date, None);
        assert!(first.dv_analysis.contains("NSE:TCS"));
    }

    #[test]
    fn test_create_normalizes_symbol_case() {
        let store = test_store();
        let trade = store.create(&demand_input("  reliance ")).unwrap();
        assert_eq!(trade.stock_name, "RELIANCE");
    }

    #[test]
    fn test_get_missing_returns_none() {
        let store = test_store();
        assert!(store.get(999).unwrap().is_none());
    }

    #[test]
    fn test_update_partial_fields() {
        let store = test_store();
        let trade = store.create(&demand_input("TCS")).unwrap();

        let updated = store
            .update(
                trade.id,
                &UpdateTradeInput {
                    entry: Some(101.5),
                    remark: Some("revised".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.entry, 101.5);
        assert_eq!(updated.remark, "revised");
        // Untouched fields survive
        assert_eq!(updated.stop_loss, 90.0);
        assert_eq!(updated.trade_zone, TradeZone::Demand);
    }

    #[test]
    fn test_update_stock_name_recomputes_chart_url() {
        let store = test_store();
        let trade = store.create(&demand_input("TCS")).unwrap();

        let updated = store
            .update(
                trade.id,
                &UpdateTradeInput {
                    stock_name: Some("HDFCBANK.NS".to_string()),
                    ..Default::default()
                },
            )
            .unwrap();

        assert_eq!(updated.stock_name, "HDFCBANK.NS");
        assert!(updated.dv_analysis.contains("NSE:HDFCBANK"));
    }

    #[test]
    fn test_update_missing_id_errors() {
        let store = test_store();
        let err = store.update(42, &UpdateTradeInput::default()).unwrap_err();
        assert!(matches!(err, StoreError::NotFound(42)));
    }

    #[test]
    fn test_delete_missing_id_is_noop() {
        let store = test_store();
        assert!(store.delete(42).is_ok());
    }

    #[test]
    fn test_list_open_excludes_terminal_trades() {
        let store = test_store();
        let a = store.create(&demand_input("AAA")).unwrap();
        let b = store.create(&demand_input("BBB")).unwrap();
        let c = store.create(&demand_input("CCC")).unwrap();

        store
            .batch_apply(&[
                TradeWrite {
                    id: b.id,
                    cmp: 121.0,
                    status: Some(TradeStatus::TargetHit),
                    trigger_date: None,
                    exit_date: Some("2025-05-01 10:30".to_string()),
                },
                TradeWrite {
                    id: c.id,
                    cmp: 89.0,
                    status: Some(TradeStatus::SlHit),
                    trigger_date: None,
                    exit_date: Some("2025-05-01 10:30".to_string()),
                },
            ])
            .unwrap();

        let open = store.list_open().unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].id, a.id);
    }

    #[test]
    fn test_legacy_row_defaults() {
        let store = test_store();
        {
            let conn = store.db.conn.lock().unwrap();
            // Row shaped like an import from the old spreadsheet: NULL status
            // and last_alert, text junk in the numeric columns.
            conn.execute(
                "INSERT INTO trades (stock_name, cmp, entry, stop_loss, target, remark, trade_type,
                                     dv_analysis, trade_zone, created_at, updated_at)
                 VALUES ('LEGACY', '1,234.50', 'n/a', '', 250, '', 'QIT', '', 'DEMAND', 0, 0)",
                [],
            )
            .unwrap();
        }

        let open = store.list_open().unwrap();
        assert_eq!(open.len(), 1);
        let trade = &open[0];
        assert_eq!(trade.status, TradeStatus::Pending);
        assert_eq!(trade.last_alert, "");
        assert_eq!(trade.cmp, 1234.5);
        assert_eq!(trade.entry, 0.0);
        assert_eq!(trade.stop_loss, 0.0);
        assert_eq!(trade.target, 250.0);
    }

    #[test]
    fn test_batch_apply_price_only_leaves_status_untouched() {
        let store = test_store();
        let trade = store.create(&demand_input("TCS")).unwrap();

        store
            .batch_apply(&[TradeWrite::price_only(trade.id, 104.25)])
            .unwrap();

        let reloaded = store.get(trade.id).unwrap().unwrap();
        assert_eq!(reloaded.cmp, 104.25);
        assert_eq!(reloaded.status, TradeStatus::Pending);
        assert_eq!(reloaded.trigger_date, None);
    }

    #[test]
    fn test_set_last_alert_round_trip() {
        let store = test_store();
        let trade = store.create(&demand_input("TCS")).unwrap();

        store.set_last_alert(trade.id, "Within 1% Range").unwrap();
        let reloaded = store.get(trade.id).unwrap().unwrap();
        assert_eq!(reloaded.last_alert, "Within 1% Range");
    }

    #[test]
    fn test_list_filters() {
        let store = test_store();
        store.create(&demand_input("AAA")).unwrap();
        let mut supply = demand_input("BBB");
        supply.trade_zone = TradeZone::Supply;
        supply.trade_type = "QIT".to_string();
        store.create(&supply).unwrap();

        let demand_only = store
            .list(&TradeFilters {
                trade_zone: Some(TradeZone::Demand),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(demand_only.len(), 1);
        assert_eq!(demand_only[0].stock_name, "AAA");

        let qit_only = store
            .list(&TradeFilters {
                trade_type: Some("QIT".to_string()),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(qit_only.len(), 1);
        assert_eq!(qit_only[0].stock_name, "BBB");
    }

    #[test]
    fn test_pending_filter_includes_legacy_blank_status() {
        let store = test_store();
        {
            let conn = store.db.conn.lock().unwrap();
            conn.execute(
                "INSERT INTO trades (stock_name, cmp, entry, stop_loss, target, remark, trade_type,
                                     dv_analysis, trade_zone, status, created_at, updated_at)
                 VALUES ('BLANKY', 0, 0, 0, 0, '', '', '', 'SUPPLY', '', 0, 0)",
                [],
            )
            .unwrap();
        }

        let pending = store
            .list(&TradeFilters {
                status: Some(TradeStatus::Pending),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].stock_name, "BLANKY");
    }

    #[test]
    fn test_holdings_round_trip() {
        let store = test_store();
        let holding = store
            .create_holding(&CreateHoldingInput {
                stock_name: "itc".to_string(),
                date: "2025-03-10".to_string(),
                stop_loss: 380.0,
                target: 520.0,
                actual_cost: 410.0,
            })
            .unwrap();

        assert_eq!(holding.stock_name, "ITC");
        assert!(holding.cost_in_band());

        assert_eq!(store.list_holdings().unwrap().len(), 1);
        store.delete_holding("ITC").unwrap();
        assert!(store.list_holdings().unwrap().is_empty());
    }

    #[test]
    fn test_link_map_normalizes_symbols() {
        let store = test_store();
        store
            .set_link("TCS.NS", "https://www.trendlyne.com/equity/TCS/")
            .unwrap();

        let map = store.link_map().unwrap();
        assert_eq!(
            map.get("TCS").map(String::as_str),
            Some("https://www.trendlyne.com/equity/TCS/")
        );
    }

    #[test]
    fn test_settings_defaults_and_update() {
        let store = test_store();
        let settings = store.get_settings().unwrap();
        assert_eq!(settings.refresh_interval_secs, 60);
        assert!(settings.auto_refresh_enabled);

        let updated = store
            .update_settings(&UpdateSettingsInput {
                refresh_interval_secs: Some(300),
                alerts_enabled: Some(false),
                ..Default::default()
            })
            .unwrap();
        assert_eq!(updated.refresh_interval_secs, 300);
        assert!(!updated.alerts_enabled);
        assert!(updated.auto_refresh_enabled);
    }

    #[test]
    fn test_database_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("zonewatch.db");
        let path_str = path.to_str().unwrap();

        let id = {
            let db = Arc::new(Database::new(path_str).unwrap());
            let store = SqliteStore::new(db);
            store.create(&demand_input("TCS")).unwrap().id
        };

        let db = Arc::new(Database::new(path_str).unwrap());
        let store = SqliteStore::new(db);
        let trade = store.get(id).unwrap().expect("trade survives reopen");
        assert_eq!(trade.stock_name, "TCS");
    }
}
