use proptest::prelude::*;
use stress_service::{AttributionBreakdown, ServiceConfig, StressService};

const FIXTURE: &str = concat!(
    env!("CARGO_MANIFEST_DIR"),
    "/../../fixtures/acl_stress_model.json"
);

fn service() -> StressService {
    StressService::load(&ServiceConfig::with_model_path(FIXTURE)).expect("fixture loads")
}

fn measurement() -> impl Strategy<Value = [f64; 9]> {
    (
        -10.0f64..90.0,
        0.0f64..120.0,
        -20.0f64..30.0,
        -15.0f64..25.0,
        -20.0f64..20.0,
        -10.0f64..80.0,
        -150.0f64..50.0,
        0.0f64..600.0,
        0.2f64..1.2,
    )
        .prop_map(|(a, b, c, d, e, f, g, h, i)| [a, b, c, d, e, f, g, h, i])
}

proptest! {
    #[test]
    fn prop_explanation_reconstructs_prediction(x in measurement()) {
        let service = service();
        let prediction = service.predict(&x).unwrap().value;
        let breakdown = service.explain(&x).unwrap();
        let tolerance = 1e-6 * prediction.abs().max(1.0);
        prop_assert!((breakdown.reconstructed() - prediction).abs() <= tolerance);
        prop_assert!(!breakdown.used_fallback());
    }

    #[test]
    fn prop_display_rows_restore_mapping(x in measurement()) {
        let breakdown = service().explain(&x).unwrap();
        let rows = breakdown.to_display_rows();
        for pair in rows.windows(2) {
            prop_assert!(pair[0].value.abs() >= pair[1].value.abs());
        }

        let back = AttributionBreakdown::from_display_rows(
            breakdown.baseline(),
            rows,
            breakdown.method(),
            breakdown.used_fallback(),
        )
        .unwrap();
        prop_assert_eq!(back, breakdown);
    }
}

#[test]
fn test_concurrent_callers() {
    let service = std::sync::Arc::new(service());
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let service = service.clone();
            std::thread::spawn(move || {
                let mut x = [0.0; 9];
                x[5] = 10.0 * i as f64;
                let prediction = service.predict(&x).unwrap();
                let breakdown = service.explain(&x).unwrap();
                (prediction.value - breakdown.reconstructed()).abs()
            })
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap() < 1e-9);
    }
}
