use common::models::{BandCondition, PriceDirection};
use market_data::services::IndicatorBand;

pub fn price_condition_met(direction: PriceDirection, target_price: f64, price: f64) -> bool {
    match direction {
        PriceDirection::Above => price >= target_price,
        PriceDirection::Below => price <= target_price,
    }
}

/// The band value crossed by `price`, if any.
pub fn band_touched(condition: BandCondition, band: &IndicatorBand, price: f64) -> Option<f64> {
    match condition {
        BandCondition::BbUpper if price >= band.upper => Some(band.upper),
        BandCondition::BbLower if price <= band.lower => Some(band.lower),
        _ => None,
    }
}

pub fn price_message(symbol: &str, direction: PriceDirection, target: f64, current: f64) -> String {
    format!(
        "Price alert: {} is {} {:.2} (current {:.2})",
        symbol,
        direction.as_str(),
        target,
        current
    )
}

pub fn indicator_message(
    symbol: &str,
    condition: BandCondition,
    interval: &str,
    current: f64,
    band_value: f64,
) -> String {
    let side = match condition {
        BandCondition::BbUpper => "upper",
        BandCondition::BbLower => "lower",
    };
    format!(
        "Indicator alert: {} touched the {} Bollinger band ({}) at {:.2}, band {:.2}",
        symbol, side, interval, current, band_value
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn band() -> IndicatorBand {
        IndicatorBand {
            symbol: "BTCUSDT".into(),
            interval: "1h".into(),
            upper: 50_900.0,
            middle: 50_000.0,
            lower: 49_100.0,
            last_close: 50_000.0,
        }
    }

    #[test]
    fn price_directions_include_the_target() {
        assert!(price_condition_met(PriceDirection::Above, 100.0, 100.0));
        assert!(!price_condition_met(PriceDirection::Above, 100.0, 99.99));
        assert!(price_condition_met(PriceDirection::Below, 100.0, 100.0));
        assert!(!price_condition_met(PriceDirection::Below, 100.0, 100.01));
    }

    #[test]
    fn bands_report_the_crossed_value() {
        let b = band();
        assert_eq!(band_touched(BandCondition::BbUpper, &b, 51_000.0), Some(50_900.0));
        assert_eq!(band_touched(BandCondition::BbUpper, &b, 50_000.0), None);
        assert_eq!(band_touched(BandCondition::BbLower, &b, 49_100.0), Some(49_100.0));
        assert_eq!(band_touched(BandCondition::BbLower, &b, 49_500.0), None);
    }

    #[test]
    fn message_wording() {
        assert_eq!(
            price_message("BTCUSDT", PriceDirection::Above, 50_000.0, 50_010.0),
            "Price alert: BTCUSDT is above 50000.00 (current 50010.00)"
        );
        assert_eq!(
            indicator_message("BTCUSDT", BandCondition::BbUpper, "1h", 51_000.0, 50_900.0),
            "Indicator alert: BTCUSDT touched the upper Bollinger band (1h) at 51000.00, band 50900.00"
        );
    }
}
