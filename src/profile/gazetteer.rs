//! Gazetteers for the Entity Recognizer: ISO-3166 country names
//! and alpha-2 codes, a representative slice of ISO-3166-2 subdivisions,
//! ISO-4217 currency codes, and IANA timezone names.
//!
//! These lists are representative subsets, not exhaustive registries — the
//! scoring model treats gazetteer membership as high-confidence
//! evidence, not as a completeness guarantee. See DESIGN.md for the scope
//! note.

/// `(alpha-2 code, country name)`.
pub const ISO_3166_COUNTRIES: &[(&str, &str)] = &[
    ("US", "United States"),
    ("GB", "United Kingdom"),
    ("CA", "Canada"),
    ("DE", "Germany"),
    ("FR", "France"),
    ("ES", "Spain"),
    ("IT", "Italy"),
    ("NL", "Netherlands"),
    ("SE", "Sweden"),
    ("NO", "Norway"),
    ("DK", "Denmark"),
    ("FI", "Finland"),
    ("PL", "Poland"),
    ("PT", "Portugal"),
    ("IE", "Ireland"),
    ("CH", "Switzerland"),
    ("AT", "Austria"),
    ("BE", "Belgium"),
    ("BR", "Brazil"),
    ("MX", "Mexico"),
    ("AR", "Argentina"),
    ("CL", "Chile"),
    ("CO", "Colombia"),
    ("JP", "Japan"),
    ("CN", "China"),
    ("IN", "India"),
    ("KR", "South Korea"),
    ("SG", "Singapore"),
    ("AU", "Australia"),
    ("NZ", "New Zealand"),
    ("ZA", "South Africa"),
    ("NG", "Nigeria"),
    ("EG", "Egypt"),
    ("AE", "United Arab Emirates"),
    ("SA", "Saudi Arabia"),
    ("IL", "Israel"),
    ("RU", "Russia"),
    ("UA", "Ukraine"),
    ("TR", "Turkey"),
];

/// `(region code, region name)` — a representative slice, not exhaustive.
pub const ISO_3166_2_REGIONS: &[(&str, &str)] = &[
    ("US-CA", "California"),
    ("US-NY", "New York"),
    ("US-TX", "Texas"),
    ("US-WA", "Washington"),
    ("US-FL", "Florida"),
    ("US-IL", "Illinois"),
    ("US-MA", "Massachusetts"),
    ("GB-ENG", "England"),
    ("GB-SCT", "Scotland"),
    ("GB-WLS", "Wales"),
    ("CA-ON", "Ontario"),
    ("CA-BC", "British Columbia"),
    ("CA-QC", "Quebec"),
    ("DE-BY", "Bavaria"),
    ("DE-BE", "Berlin"),
    ("AU-NSW", "New South Wales"),
    ("AU-VIC", "Victoria"),
];

/// `(alpha-3 code, alpha-2 code)` — ISO-3166 alpha-3 to alpha-2 mapping for
/// the same representative country slice.
pub const ISO_3166_ALPHA3: &[(&str, &str)] = &[
    ("USA", "US"),
    ("GBR", "GB"),
    ("CAN", "CA"),
    ("DEU", "DE"),
    ("FRA", "FR"),
    ("ESP", "ES"),
    ("ITA", "IT"),
    ("NLD", "NL"),
    ("SWE", "SE"),
    ("NOR", "NO"),
    ("DNK", "DK"),
    ("FIN", "FI"),
    ("POL", "PL"),
    ("PRT", "PT"),
    ("IRL", "IE"),
    ("CHE", "CH"),
    ("AUT", "AT"),
    ("BEL", "BE"),
    ("BRA", "BR"),
    ("MEX", "MX"),
    ("ARG", "AR"),
    ("CHL", "CL"),
    ("COL", "CO"),
    ("JPN", "JP"),
    ("CHN", "CN"),
    ("IND", "IN"),
    ("KOR", "KR"),
    ("SGP", "SG"),
    ("AUS", "AU"),
    ("NZL", "NZ"),
    ("ZAF", "ZA"),
    ("NGA", "NG"),
    ("EGY", "EG"),
    ("ARE", "AE"),
    ("SAU", "SA"),
    ("ISR", "IL"),
    ("RUS", "RU"),
    ("UKR", "UA"),
    ("TUR", "TR"),
];

pub const ISO_4217_CURRENCIES: &[&str] = &[
    "USD", "EUR", "GBP", "JPY", "CNY", "CHF", "CAD", "AUD", "NZD", "SEK", "NOK", "DKK", "PLN",
    "BRL", "MXN", "ARS", "CLP", "COP", "INR", "KRW", "SGD", "HKD", "ZAR", "NGN", "EGP", "AED",
    "SAR", "ILS", "RUB", "TRY", "THB", "IDR", "MYR", "PHP", "VND",
];

/// `(localized currency name, ISO-4217 code)` — representative slice.
pub const CURRENCY_NAMES: &[(&str, &str)] = &[
    ("us dollar", "USD"),
    ("dollar", "USD"),
    ("euro", "EUR"),
    ("pound sterling", "GBP"),
    ("british pound", "GBP"),
    ("pound", "GBP"),
    ("yen", "JPY"),
    ("japanese yen", "JPY"),
    ("yuan", "CNY"),
    ("renminbi", "CNY"),
    ("swiss franc", "CHF"),
    ("franc", "CHF"),
    ("canadian dollar", "CAD"),
    ("australian dollar", "AUD"),
    ("rupee", "INR"),
    ("indian rupee", "INR"),
    ("won", "KRW"),
    ("real", "BRL"),
    ("peso", "MXN"),
    ("rand", "ZAR"),
    ("ruble", "RUB"),
    ("lira", "TRY"),
];

/// `(symbol, ISO-4217 code)` — a small fixed set, ambiguous symbols (e.g.
/// "$") map to the most common code.
pub const CURRENCY_SYMBOLS: &[(&str, &str)] = &[
    ("$", "USD"),
    ("€", "EUR"),
    ("£", "GBP"),
    ("¥", "JPY"),
    ("₹", "INR"),
    ("₩", "KRW"),
    ("₽", "RUB"),
    ("₺", "TRY"),
];

/// Representative IANA timezone identifiers.
pub const IANA_TIMEZONES: &[&str] = &[
    "America/New_York",
    "America/Chicago",
    "America/Denver",
    "America/Los_Angeles",
    "America/Sao_Paulo",
    "America/Mexico_City",
    "America/Toronto",
    "Europe/London",
    "Europe/Berlin",
    "Europe/Paris",
    "Europe/Madrid",
    "Europe/Rome",
    "Europe/Amsterdam",
    "Europe/Moscow",
    "Europe/Istanbul",
    "Asia/Tokyo",
    "Asia/Shanghai",
    "Asia/Kolkata",
    "Asia/Singapore",
    "Asia/Dubai",
    "Asia/Seoul",
    "Australia/Sydney",
    "Australia/Melbourne",
    "Africa/Johannesburg",
    "Africa/Cairo",
    "Africa/Lagos",
    "UTC",
];

pub fn lookup_country_by_code(code: &str) -> Option<&'static str> {
    let upper = code.to_uppercase();
    ISO_3166_COUNTRIES
        .iter()
        .find(|(c, _)| *c == upper)
        .map(|(_, name)| *name)
}

pub fn lookup_country_by_name(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    ISO_3166_COUNTRIES
        .iter()
        .find(|(_, n)| n.to_lowercase() == lower)
        .map(|(code, _)| *code)
}

pub fn is_currency_code(code: &str) -> bool {
    let upper = code.to_uppercase();
    ISO_4217_CURRENCIES.contains(&upper.as_str())
}

pub fn is_iana_timezone(name: &str) -> bool {
    IANA_TIMEZONES.iter().any(|tz| tz.eq_ignore_ascii_case(name))
}

pub fn lookup_region(code: &str) -> Option<&'static str> {
    let upper = code.to_uppercase();
    ISO_3166_2_REGIONS
        .iter()
        .find(|(c, _)| *c == upper)
        .map(|(_, name)| *name)
}

/// Alpha-3 country code -> alpha-2, case-insensitive.
pub fn lookup_country_by_alpha3(code: &str) -> Option<&'static str> {
    let upper = code.to_uppercase();
    ISO_3166_ALPHA3
        .iter()
        .find(|(a3, _)| *a3 == upper)
        .map(|(_, a2)| *a2)
}

/// Subdivision name (e.g. "California") -> subdivision code (e.g. "US-CA").
pub fn lookup_region_by_name(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    ISO_3166_2_REGIONS
        .iter()
        .find(|(_, n)| n.to_lowercase() == lower)
        .map(|(code, _)| *code)
}

/// Localized currency name (e.g. "Euro") -> ISO-4217 code.
pub fn lookup_currency_by_name(name: &str) -> Option<&'static str> {
    let lower = name.to_lowercase();
    CURRENCY_NAMES
        .iter()
        .find(|(n, _)| *n == lower)
        .map(|(_, code)| *code)
}

/// Currency symbol (e.g. "$") -> ISO-4217 code.
pub fn lookup_currency_by_symbol(symbol: &str) -> Option<&'static str> {
    CURRENCY_SYMBOLS
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, code)| *code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn looks_up_country_by_code_case_insensitively() {
        assert_eq!(lookup_country_by_code("us"), Some("United States"));
        assert_eq!(lookup_country_by_code("zz"), None);
    }

    #[test]
    fn recognizes_currency_codes() {
        assert!(is_currency_code("usd"));
        assert!(!is_currency_code("XXX"));
    }

    #[test]
    fn recognizes_iana_timezones() {
        assert!(is_iana_timezone("America/New_York"));
        assert!(!is_iana_timezone("Mars/Crater"));
    }

    #[test]
    fn looks_up_country_by_alpha3() {
        assert_eq!(lookup_country_by_alpha3("usa"), Some("US"));
        assert_eq!(lookup_country_by_alpha3("zzz"), None);
    }

    #[test]
    fn looks_up_region_by_name() {
        assert_eq!(lookup_region_by_name("California"), Some("US-CA"));
    }

    #[test]
    fn looks_up_currency_by_name_and_symbol() {
        assert_eq!(lookup_currency_by_name("Euro"), Some("EUR"));
        assert_eq!(lookup_currency_by_symbol("$"), Some("USD"));
    }
}
