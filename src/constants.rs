//! Market Constants
//!
//! Static symbol tables and fetch tuning values for the VN30 cache job.
//! Everything here is immutable for the lifetime of the process.

/// Symbol of the VN30 index itself
pub const VN30_INDEX_SYMBOL: &str = "VN30";

/// Display name stored for the index pseudo-record
pub const VN30_INDEX_NAME: &str = "Chỉ số VN30";

/// Index tickers are never rescaled by the price multiplier
pub const INDEX_TICKERS: &[&str] = &["VNINDEX", "VN30"];

/// VN30 constituent symbols, in fetch order
pub const VN30_SYMBOLS: [&str; 30] = [
    "ACB", "BCM", "BID", "BVH", "CTG", "FPT", "GAS", "GVR", "HDB", "HPG",
    "KDH", "MBB", "MSN", "MWG", "NVL", "PDR", "PLX", "POW", "SAB", "SSI",
    "STB", "TCB", "TPB", "VCB", "VHM", "VIB", "VIC", "VJC", "VNM", "VPB",
];

/// Company name used when a symbol is missing from [`COMPANY_NAMES`]
pub const DEFAULT_COMPANY_NAME: &str = "Công ty Cổ phần";

/// Company names of the VN30 constituents
pub const COMPANY_NAMES: &[(&str, &str)] = &[
    ("ACB", "Ngân hàng TMCP Á Châu"),
    ("BCM", "Tổng Công ty Đầu tư và Phát triển Công nghiệp"),
    ("BID", "Ngân hàng TMCP Đầu tư và Phát triển Việt Nam"),
    ("BVH", "Tập đoàn Bảo Việt"),
    ("CTG", "Ngân hàng TMCP Công thương Việt Nam"),
    ("FPT", "Tổng Công ty Cổ phần FPT"),
    ("GAS", "Tổng Công ty Khí Việt Nam"),
    ("GVR", "Tập đoàn Công nghiệp Cao su Việt Nam"),
    ("HDB", "Ngân hàng TMCP Phát triển TP.HCM"),
    ("HPG", "Tổng Công ty Cổ phần Tập đoàn Hòa Phát"),
    ("KDH", "Công ty Cổ phần Đầu tư và Kinh doanh Nhà Khang Điền"),
    ("MBB", "Ngân hàng TMCP Quân đội"),
    ("MSN", "Tổng Công ty Cổ phần Dịch vụ Số Viettel"),
    ("MWG", "Công ty Cổ phần Đầu tư Thế Giới Di Động"),
    ("NVL", "Công ty Cổ phần Tập đoàn Đầu tư Địa ốc No Va"),
    ("PDR", "Công ty Cổ phần Phát triển Bất động sản Phát Đạt"),
    ("PLX", "Tập đoàn Xăng dầu Việt Nam"),
    ("POW", "Tổng Công ty Điện lực Dầu khí Việt Nam"),
    ("SAB", "Tổng Công ty Cổ phần Bia - Rượu - Nước giải khát Sài Gòn"),
    ("SSI", "Công ty Cổ phần Chứng khoán SSI"),
    ("STB", "Ngân hàng TMCP Sài Gòn Thương Tín"),
    ("TCB", "Ngân hàng TMCP Kỹ thương Việt Nam"),
    ("TPB", "Ngân hàng TMCP Tiên Phong"),
    ("VCB", "Ngân hàng TMCP Ngoại thương Việt Nam"),
    ("VHM", "Công ty Cổ phần Vinhomes"),
    ("VIB", "Ngân hàng TMCP Quốc tế"),
    ("VIC", "Tập đoàn Vingroup"),
    ("VJC", "Công ty Cổ phần Hàng không Vietjet"),
    ("VNM", "Công ty Cổ phần Sữa Việt Nam"),
    ("VPB", "Ngân hàng TMCP Việt Nam Thịnh Vượng"),
];

/// Look up the company name for a symbol (case-insensitive)
pub fn company_name(symbol: &str) -> &'static str {
    COMPANY_NAMES
        .iter()
        .find(|(s, _)| s.eq_ignore_ascii_case(symbol))
        .map(|(_, name)| *name)
        .unwrap_or(DEFAULT_COMPANY_NAME)
}

/// Whether the symbol is a market index rather than a stock
pub fn is_index(symbol: &str) -> bool {
    INDEX_TICKERS.iter().any(|t| t.eq_ignore_ascii_case(symbol))
}

/// Name recorded in the overview metadata for the upstream provider
pub const DATA_SOURCE: &str = "vci";

/// Number of minute candles requested per intraday page
pub const INTRADAY_PAGE_SIZE: u32 = 160;

/// Intraday pages fetched for the latest trading day
pub const INTRADAY_PAGES_LATEST: usize = 2;

/// Intraday pages fetched when the previous trading day is requested.
/// Enough to span two calendar days in the worst case.
pub const INTRADAY_PAGES_PREVIOUS: usize = 4;

/// Daily bars requested per symbol. Covers the two rows needed for the
/// change calculation and the 26 sessions used by the MACD estimate.
pub const DAILY_HISTORY_BARS: u32 = 30;

/// Maximum entries in the top gainers and top losers lists
pub const TOP_MOVERS_LIMIT: usize = 5;

/// Vietnam market timezone (UTC+7, no DST)
pub const MARKET_TIMEZONE: &str = "Asia/Ho_Chi_Minh";

/// Offset applied to upstream UTC timestamps for local output
pub const MARKET_UTC_OFFSET_SECS: i32 = 7 * 3600;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_symbol_has_company_name() {
        for symbol in VN30_SYMBOLS {
            assert_ne!(company_name(symbol), DEFAULT_COMPANY_NAME, "missing name for {}", symbol);
        }
        assert_eq!(COMPANY_NAMES.len(), VN30_SYMBOLS.len());
    }

    #[test]
    fn test_unknown_symbol_falls_back() {
        assert_eq!(company_name("ZZZ"), DEFAULT_COMPANY_NAME);
        assert_eq!(company_name("vcb"), "Ngân hàng TMCP Ngoại thương Việt Nam");
    }

    #[test]
    fn test_index_detection() {
        assert!(is_index("VN30"));
        assert!(is_index("vnindex"));
        assert!(!is_index("FPT"));
    }
}
