//! Display formatting for table cells and summary fields

use chrono::NaiveDate;

/// "$1,234.50"; negative amounts keep the sign in front of the symbol
pub fn money(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = group_thousands(cents / 100);
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, whole, cents % 100)
}

/// One decimal, e.g. "7.5"
pub fn hours(value: f64) -> String {
    format!("{:.1}", value)
}

/// "DD/MM/YYYY"
pub fn date(value: NaiveDate) -> String {
    value.format("%d/%m/%Y").to_string()
}

fn group_thousands(mut value: u64) -> String {
    let mut groups = Vec::new();
    loop {
        if value < 1000 {
            groups.push(value.to_string());
            break;
        }
        groups.push(format!("{:03}", value % 1000));
        value /= 1000;
    }
    groups.reverse();
    groups.join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money() {
        assert_eq!(money(0.0), "$0.00");
        assert_eq!(money(1200.0), "$1,200.00");
        assert_eq!(money(1234567.891), "$1,234,567.89");
        assert_eq!(money(-45.5), "-$45.50");
        assert_eq!(money(999.999), "$1,000.00");
    }

    #[test]
    fn test_hours_and_date() {
        assert_eq!(hours(4.0), "4.0");
        assert_eq!(hours(8.26), "8.3");
        let d = NaiveDate::from_ymd_opt(2024, 3, 5).unwrap();
        assert_eq!(date(d), "05/03/2024");
    }
}
