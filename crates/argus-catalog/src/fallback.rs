/// Static sector table used when no live data has ever been fetched.
/// Mirrors the major US large caps so a degraded catalog still satisfies
/// the generator's non-empty and uniqueness invariants.
pub const FALLBACK_SECTORS: &[(&str, &[&str])] = &[
    (
        "Technology",
        &["AAPL", "MSFT", "GOOGL", "META", "NVDA", "TSLA", "NFLX", "AMZN"],
    ),
    (
        "Healthcare",
        &["JNJ", "PFE", "UNH", "ABBV", "TMO", "DHR", "CVS", "MRK"],
    ),
    (
        "Financial",
        &["JPM", "BAC", "WFC", "GS", "MS", "C", "COF", "AXP"],
    ),
    (
        "Energy",
        &["XOM", "CVX", "COP", "EOG", "PXD", "SLB", "MRO", "VLO"],
    ),
    (
        "Consumer",
        &["PG", "KO", "PEP", "WMT", "HD", "MCD", "NKE", "SBUX"],
    ),
    (
        "Industrial",
        &["BA", "CAT", "GE", "HON", "UPS", "LMT", "MMM", "FDX"],
    ),
    (
        "Materials",
        &["LIN", "APD", "SHW", "ECL", "FCX", "NEM", "DOW", "DD"],
    ),
    (
        "Utilities",
        &["NEE", "SO", "DUK", "AEP", "EXC", "XEL", "PEG", "SRE"],
    ),
];

/// Companies with known crypto treasury or mining exposure, used by the
/// crypto-focused query strategy.
pub const CRYPTO_EXPOSED_TICKERS: &[&str] = &[
    "MSTR", "TSLA", "COIN", "RIOT", "MARA", "CLSK", "HUT", "BITF", "SQ", "PYPL", "NVDA", "AMD",
];
