use chrono::NaiveDate;

/// Insert thousands separators into a non-negative integer
pub fn group_thousands(value: u64) -> String {
    let digits = value.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    grouped
}

fn currency_symbol(code: &str) -> Option<&'static str> {
    match code {
        "KRW" => Some("₩"),
        "USD" => Some("$"),
        "EUR" => Some("€"),
        "GBP" => Some("£"),
        "JPY" => Some("¥"),
        _ => None,
    }
}

/// Currencies displayed without minor units
fn has_no_minor_units(code: &str) -> bool {
    matches!(code, "KRW" | "JPY")
}

/// Format an amount for display, e.g. "₩1,234,000" or "-$12.50".
/// Unknown currency codes are appended instead of a symbol.
pub fn format_currency(amount: f64, code: &str) -> String {
    let sign = if amount < 0.0 { "-" } else { "" };
    let abs = amount.abs();

    let number = if has_no_minor_units(code) {
        group_thousands(abs.round() as u64)
    } else {
        let cents = (abs * 100.0).round() as u64;
        format!("{}.{:02}", group_thousands(cents / 100), cents % 100)
    };

    match currency_symbol(code) {
        Some(symbol) => format!("{}{}{}", sign, symbol, number),
        None => format!("{}{} {}", sign, number, code),
    }
}

/// One decimal place, e.g. "42.5%"
pub fn format_percentage(value: f64) -> String {
    format!("{:.1}%", value)
}

/// Month and day for list views, e.g. "Mar 15"
pub fn format_short_date(date: NaiveDate) -> String {
    date.format("%b %d").to_string()
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
