/// ISO 4217 codes accepted when opening accounts and requesting transfers.
pub const SUPPORTED_CURRENCIES: [&str; 20] = [
    "USD", "EUR", "JPY", "GBP", "AUD", "CAD", "CHF", "CNY", "HKD", "NZD", "SEK", "KRW", "SGD",
    "NOK", "MXN", "INR", "RUB", "ZAR", "TRY", "BRL",
];

/// Normalize a currency code to upper case and check it against the
/// supported table.
pub fn normalize_currency(code: &str) -> Option<&'static str> {
    let code = code.trim();
    SUPPORTED_CURRENCIES
        .iter()
        .copied()
        .find(|supported| supported.eq_ignore_ascii_case(code))
}
