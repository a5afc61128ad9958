//! Stand-in weather for when the provider is unavailable.
//!
//! Values follow Naga City's climate: a diurnal temperature curve, a hot
//! April–June, and a wet season from June to November with afternoon showers.
//! The clock and the random source are passed in, so a seeded RNG gives a
//! reproducible snapshot.

use std::f64::consts::PI;

use chrono::{DateTime, Datelike, Days, Timelike, Utc};
use chrono_tz::Tz;
use rand::Rng;

use super::models::{round1, DailyForecast, DataSource, WeatherCondition, WeatherSnapshot};

const BASE_TEMPERATURE: f64 = 27.5;
const BASE_HUMIDITY: f64 = 75.0;
pub const HUMIDITY_MIN: f64 = 50.0;
pub const HUMIDITY_MAX: f64 = 95.0;

fn is_wet_season(month: u32) -> bool {
    (6..=11).contains(&month)
}

fn is_hot_season(month: u32) -> bool {
    (4..=6).contains(&month)
}

pub fn simulate_current<R: Rng>(
    now: DateTime<Utc>,
    tz: Tz,
    location: &str,
    rng: &mut R,
) -> WeatherSnapshot {
    let local = now.with_timezone(&tz);
    let hour = local.hour();
    let month = local.month();

    let diurnal = ((f64::from(hour) - 6.0) * PI / 12.0).sin() * 3.0;
    let seasonal = if is_hot_season(month) { 1.5 } else { 0.0 };
    let temperature = BASE_TEMPERATURE + diurnal + seasonal + rng.gen_range(-1.0..=1.0);

    let night = hour >= 18 || hour <= 6;
    let humidity = (BASE_HUMIDITY
        + if night { 5.0 } else { -5.0 }
        + if is_wet_season(month) { 8.0 } else { 0.0 }
        + rng.gen_range(-2.5..=2.5))
    .clamp(HUMIDITY_MIN, HUMIDITY_MAX);

    let rainfall = if is_wet_season(month) {
        let chance = if (14..=18).contains(&hour) { 0.4 } else { 0.15 };
        if rng.gen_bool(chance) {
            rng.gen_range(10.0..160.0)
        } else {
            0.0
        }
    } else if rng.gen_bool(0.05) {
        rng.gen_range(5.0..55.0)
    } else {
        0.0
    };

    let condition = if rainfall > 0.0 {
        WeatherCondition::Rain
    } else {
        WeatherCondition::Clear
    };

    let icon = match condition {
        WeatherCondition::Rain => "10d",
        _ if (6..18).contains(&hour) => "01d",
        _ => "01n",
    };

    WeatherSnapshot {
        temperature: round1(temperature),
        humidity: humidity.round(),
        rainfall: round1(rainfall),
        wind_speed: round1(rng.gen_range(5.0..=20.0)),
        condition,
        icon: icon.to_string(),
        location: location.to_string(),
        captured_at: now,
        source: DataSource::Simulated,
    }
}

/// Seven days starting today (local calendar)
pub fn simulate_forecast<R: Rng>(
    now: DateTime<Utc>,
    tz: Tz,
    rng: &mut R,
) -> Vec<DailyForecast> {
    let local = now.with_timezone(&tz);
    let today = local.date_naive();
    let wet = is_wet_season(local.month());

    (0..7u64)
        .filter_map(|offset| today.checked_add_days(Days::new(offset)))
        .map(|date| {
            let base = BASE_TEMPERATURE + rng.gen_range(-1.5..=1.5);
            let rainfall = if wet {
                rng.gen_range(0.0..50.0)
            } else {
                rng.gen_range(0.0..10.0)
            };
            let condition = if rainfall > 20.0 {
                WeatherCondition::Rain
            } else if rainfall > 5.0 {
                WeatherCondition::Clouds
            } else {
                WeatherCondition::Clear
            };

            DailyForecast {
                date,
                temp: base.round(),
                temp_min: (base - 2.0).round(),
                temp_max: (base + 2.0).round(),
                humidity: round1(70.0 + rng.gen_range(0.0..15.0)),
                rainfall: round1(rainfall),
                condition,
                icon: if condition == WeatherCondition::Rain {
                    "10d"
                } else {
                    "01d"
                }
                .to_string(),
                wind_speed: (5.0_f64 + rng.gen_range(0.0..15.0)).round(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use chrono_tz::Asia::Manila;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_ranges_hold_for_every_hour_and_month() {
        let mut rng = StdRng::seed_from_u64(7);
        for month in 1..=12 {
            let start = Utc.with_ymd_and_hms(2024, month, 15, 0, 0, 0).unwrap();
            for hour in 0..24 {
                let now = start + Duration::hours(hour);
                for _ in 0..20 {
                    let snapshot = simulate_current(now, Manila, "Naga City", &mut rng);
                    assert!(
                        (HUMIDITY_MIN..=HUMIDITY_MAX).contains(&snapshot.humidity),
                        "humidity {}",
                        snapshot.humidity
                    );
                    assert!(snapshot.rainfall >= 0.0);
                    assert!((23.0..=33.0).contains(&snapshot.temperature));
                    assert!((5.0..=20.0).contains(&snapshot.wind_speed));
                    assert_eq!(snapshot.source, DataSource::Simulated);
                }
            }
        }
    }

    #[test]
    fn test_same_seed_same_snapshot() {
        let now = Utc.with_ymd_and_hms(2024, 7, 1, 7, 0, 0).unwrap();
        let a = simulate_current(now, Manila, "Naga City", &mut StdRng::seed_from_u64(42));
        let b = simulate_current(now, Manila, "Naga City", &mut StdRng::seed_from_u64(42));
        assert_eq!(a, b);
    }

    #[test]
    fn test_condition_follows_rainfall() {
        let mut rng = StdRng::seed_from_u64(3);
        // 07:00 UTC is 15:00 in Manila, the wet-season afternoon window
        let now = Utc.with_ymd_and_hms(2024, 8, 10, 7, 0, 0).unwrap();
        for _ in 0..200 {
            let snapshot = simulate_current(now, Manila, "Naga City", &mut rng);
            if snapshot.rainfall > 0.0 {
                assert_eq!(snapshot.condition, WeatherCondition::Rain);
                assert!(snapshot.rainfall >= 10.0);
            } else {
                assert_eq!(snapshot.condition, WeatherCondition::Clear);
            }
        }
    }

    #[test]
    fn test_forecast_covers_seven_consecutive_days() {
        let mut rng = StdRng::seed_from_u64(11);
        // 20:00 UTC on Jan 31 is already Feb 1 in Manila
        let now = Utc.with_ymd_and_hms(2024, 1, 31, 20, 0, 0).unwrap();
        let days = simulate_forecast(now, Manila, &mut rng);

        assert_eq!(days.len(), 7);
        assert_eq!(days[0].date, chrono::NaiveDate::from_ymd_opt(2024, 2, 1).unwrap());
        for pair in days.windows(2) {
            assert_eq!(pair[1].date - pair[0].date, Duration::days(1));
        }
        for day in &days {
            assert!(day.rainfall < 10.0);
            assert!(day.temp_min < day.temp_max);
            assert!((5.0..=20.0).contains(&day.wind_speed));
        }
    }
}
