//! Exchange-suffix handling for NSE/BSE symbols. Stored names may carry a
//! `.NS` or `.BO` suffix; display and link lookup use the bare symbol, quote
//! queries need the suffixed one.

const NSE_SUFFIX: &str = ".NS";
const BSE_SUFFIX: &str = ".BO";

/// Bare upper-case symbol for display and link lookup.
pub fn normalize(symbol: &str) -> String {
    let s = symbol.trim().to_uppercase();
    s.trim_end_matches(NSE_SUFFIX)
        .trim_end_matches(BSE_SUFFIX)
        .to_string()
}

/// Fully-qualified symbol for quote queries. Bare symbols default to NSE.
pub fn quote_symbol(symbol: &str) -> String {
    let s = symbol.trim().to_uppercase();
    if s.ends_with(NSE_SUFFIX) || s.ends_with(BSE_SUFFIX) {
        s
    } else {
        format!("{}{}", s, NSE_SUFFIX)
    }
}

/// TradingView chart link stored alongside each trade.
pub fn chart_url(symbol: &str) -> String {
    format!(
        "https://in.tradingview.com/chart/?symbol=NSE:{}",
        normalize(symbol)
    )
}
