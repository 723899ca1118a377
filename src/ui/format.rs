use rust_decimal::{Decimal, RoundingStrategy};

/// Direction of a change. Zero counts as a gain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Trend {
    Gain,
    Loss,
}

impl Trend {
    pub fn of(value: Decimal) -> Self {
        if value.is_sign_negative() && !value.is_zero() {
            Trend::Loss
        } else {
            Trend::Gain
        }
    }

    pub fn arrow(&self) -> &'static str {
        match self {
            Trend::Gain => "▲",
            Trend::Loss => "▼",
        }
    }
}

impl std::fmt::Display for Trend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trend::Gain => write!(f, "Gain"),
            Trend::Loss => write!(f, "Loss"),
        }
    }
}

/// A percentage shown as unsigned magnitude plus direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PercentChange {
    pub magnitude: String,
    pub trend: Trend,
}

impl PercentChange {
    pub fn of(value: Decimal) -> Self {
        Self {
            magnitude: format_percent(value.abs()),
            trend: Trend::of(value),
        }
    }
}

impl std::fmt::Display for PercentChange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.trend.arrow(), self.magnitude)
    }
}

fn to_cents(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

fn group_thousands(whole: &str) -> String {
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    grouped
}

/// `$1,234.56`, `-$1,234.50`
pub fn format_money(value: Decimal) -> String {
    let rounded = to_cents(value);
    let sign = if Trend::of(rounded) == Trend::Loss { "-" } else { "" };
    let digits = format!("{:.2}", rounded.abs());
    let (whole, cents) = digits.split_once('.').unwrap_or((digits.as_str(), "00"));
    format!("{}${}.{}", sign, group_thousands(whole), cents)
}

/// Two decimals, sign kept: `-3.10%`
pub fn format_percent(value: Decimal) -> String {
    let rounded = to_cents(value);
    if rounded.is_zero() {
        return "0.00%".to_string();
    }
    format!("{:.2}%", rounded)
}

/// Money with an explicit sign on gains: `+$12.00`
pub fn format_signed(value: Decimal) -> String {
    let rounded = to_cents(value);
    match Trend::of(rounded) {
        Trend::Gain => format!("+{}", format_money(rounded)),
        Trend::Loss => format_money(rounded),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_money() {
        assert_eq!(format_money(dec!(1234.56)), "$1,234.56");
        assert_eq!(format_money(dec!(-1234.5)), "-$1,234.50");
        assert_eq!(format_money(dec!(0)), "$0.00");
        assert_eq!(format_money(dec!(999.999)), "$1,000.00");
        assert_eq!(format_money(dec!(1234567)), "$1,234,567.00");
        assert_eq!(format_money(dec!(-0.001)), "$0.00");
        assert_eq!(format_money(dec!(12.345)), "$12.35");
    }

    #[test]
    fn test_percent_and_trend() {
        assert_eq!(format_percent(dec!(2.5)), "2.50%");
        assert_eq!(format_percent(dec!(-3.1)), "-3.10%");
        assert_eq!(format_percent(dec!(-0.001)), "0.00%");

        assert_eq!(Trend::of(dec!(0)), Trend::Gain);
        assert_eq!(Trend::of(dec!(-0.01)), Trend::Loss);

        let change = PercentChange::of(dec!(-1.234));
        assert_eq!(change.magnitude, "1.23%");
        assert_eq!(change.trend, Trend::Loss);
        assert_eq!(change.to_string(), "▼ 1.23%");
    }

    #[test]
    fn test_signed() {
        assert_eq!(format_signed(dec!(12)), "+$12.00");
        assert_eq!(format_signed(dec!(-7.5)), "-$7.50");
    }
}
