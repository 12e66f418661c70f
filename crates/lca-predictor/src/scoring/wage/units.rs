use std::fmt;
use std::str::FromStr;

/// Pay period a disclosed wage is quoted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PayUnit {
    Year,
    Hour,
    Week,
    BiWeekly,
    Month,
    Day,
}

impl PayUnit {
    /// Periods per year used to annualize a wage.
    pub const fn periods_per_year(self) -> f64 {
        match self {
            PayUnit::Year => 1.0,
            PayUnit::Hour => 2080.0,
            PayUnit::Week => 52.0,
            PayUnit::BiWeekly => 26.0,
            PayUnit::Month => 12.0,
            PayUnit::Day => 260.0,
        }
    }

    pub fn annualize(self, value: f64) -> f64 {
        value * self.periods_per_year()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized pay unit '{0}'")]
pub struct UnknownPayUnit(pub String);

impl FromStr for PayUnit {
    type Err = UnknownPayUnit;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "year" | "yr" | "y" | "per year" | "annum" | "annual" => Ok(PayUnit::Year),
            "hour" | "hr" | "h" => Ok(PayUnit::Hour),
            "week" | "wk" | "w" => Ok(PayUnit::Week),
            "month" | "mo" | "m" => Ok(PayUnit::Month),
            "bi-weekly" | "biweekly" => Ok(PayUnit::BiWeekly),
            "day" | "d" => Ok(PayUnit::Day),
            _ => Err(UnknownPayUnit(raw.to_string())),
        }
    }
}

impl fmt::Display for PayUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            PayUnit::Year => "Year",
            PayUnit::Hour => "Hour",
            PayUnit::Week => "Week",
            PayUnit::BiWeekly => "Bi-Weekly",
            PayUnit::Month => "Month",
            PayUnit::Day => "Day",
        };
        f.write_str(label)
    }
}

/// Annual equivalent of `value` quoted per `unit`; `None` for unknown units
/// or non-finite values.
pub fn to_annual(value: f64, unit: &str) -> Option<f64> {
    if !value.is_finite() {
        return None;
    }
    unit.parse::<PayUnit>().ok().map(|unit| unit.annualize(value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_documented_units() {
        assert_eq!(to_annual(50.0, "Hour"), Some(104_000.0));
        assert_eq!(to_annual(2000.0, "month"), Some(24_000.0));
        assert_eq!(to_annual(1500.0, " WK "), Some(78_000.0));
        assert_eq!(to_annual(3000.0, "Bi-Weekly"), Some(78_000.0));
        assert_eq!(to_annual(400.0, "d"), Some(104_000.0));
        assert_eq!(to_annual(90_000.0, "per year"), Some(90_000.0));
    }

    #[test]
    fn rejects_unknown_units_and_bad_values() {
        assert_eq!(to_annual(100.0, "fortnight"), None);
        assert_eq!(to_annual(100.0, ""), None);
        assert_eq!(to_annual(f64::NAN, "Year"), None);
    }

    #[test]
    fn display_round_trips_through_parse() {
        for unit in [
            PayUnit::Year,
            PayUnit::Hour,
            PayUnit::Week,
            PayUnit::BiWeekly,
            PayUnit::Month,
            PayUnit::Day,
        ] {
            assert_eq!(unit.to_string().parse::<PayUnit>(), Ok(unit));
        }
    }
}
