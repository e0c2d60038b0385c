use approx::assert_relative_eq;
use price_forecast::metrics::{mape, mape_label, r2_label, r2_score, rmse, ForecastMetrics};
use price_forecast::{ErrorKind, ForecastError};
use rstest::rstest;

#[rstest]
#[case(0.0, "ótimo")]
#[case(4.9999, "ótimo")]
#[case(5.0, "bom")]
#[case(9.99, "bom")]
#[case(10.0, "ruim")]
#[case(250.0, "ruim")]
fn test_mape_labels(#[case] value: f64, #[case] expected: &str) {
    assert_eq!(mape_label(value), expected);
}

#[rstest]
#[case(1.0, "ótimo")]
#[case(0.5001, "ótimo")]
#[case(0.5, "aceitável")]
#[case(0.01, "aceitável")]
#[case(0.0, "ruim")]
#[case(-3.0, "ruim")]
fn test_r2_labels(#[case] value: f64, #[case] expected: &str) {
    assert_eq!(r2_label(value), expected);
}

#[test]
fn test_forecast_metrics() {
    let actual = [100.0, 102.0, 101.0, 105.0];
    let predicted = [101.0, 101.0, 103.0, 104.0];
    let metrics = ForecastMetrics::compute(&actual, &predicted).unwrap();

    assert_relative_eq!(metrics.mape, mape(&actual, &predicted).unwrap());
    assert_relative_eq!(metrics.rmse, (7.0f64 / 4.0).sqrt());
    assert!(metrics.rmse >= 0.0);
    assert!(metrics.r2 <= 1.0);
    assert_relative_eq!(metrics.r2, r2_score(&actual, &predicted).unwrap());

    let text = metrics.to_string();
    assert!(text.contains("MAPE"));
    assert!(text.contains("R²"));
}

#[test]
fn test_zero_actual_is_classified_as_computation() {
    let error = mape(&[0.0, 1.0], &[0.5, 1.0]).unwrap_err();
    assert!(matches!(error, ForecastError::ComputationError(_)));
    assert_eq!(error.kind(), ErrorKind::Computation);

    let error = rmse(&[1.0], &[]).unwrap_err();
    assert_eq!(error.kind(), ErrorKind::Validation);
}
