use std::path::PathBuf;
use std::sync::Arc;

use pepper_forecast::{FileModelStore, ForecastEngine, ModelRegistry, ModelStore};
use rstest::rstest;

fn models_dir(family: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("models").join(family)
}

#[rstest]
#[case("district_models", "GR-1 - Price", &["Kegalle", "Matale"])]
#[case("pickle_models", "National_Price", &["GR1"])]
fn shipped_bundles_report_their_predictor_kind(
    #[case] family: &str,
    #[case] column: &str,
    #[case] expected: &[&str],
) {
    let store = FileModelStore::new(models_dir(family), column, "LSTM");
    assert_eq!(store.list_entities().unwrap(), expected);

    for entity in expected {
        let bundle = store.load_bundle(entity).unwrap();
        assert_eq!(
            bundle.model_kind.to_lowercase(),
            bundle.predictor.kind(),
            "{} labels a {} predictor as {}",
            entity,
            bundle.predictor.kind(),
            bundle.model_kind
        );
        assert_eq!(store.describe(entity).unwrap().model_type, bundle.model_kind);
    }
}

#[rstest]
#[case("district_models", "GR-1 - Price", "Kegalle")]
#[case("district_models", "GR-1 - Price", "Matale")]
#[case("pickle_models", "National_Price", "GR1")]
#[tokio::test]
async fn shipped_bundles_forecast_a_year_ahead(#[case] family: &str, #[case] column: &str, #[case] entity: &str) {
    let store = FileModelStore::new(models_dir(family), column, "LSTM");
    let engine = ForecastEngine::new(Arc::new(ModelRegistry::new(Arc::new(store))));

    let forecast = engine.forecast(entity, "2026-06-30").await.unwrap();
    assert!(forecast.steps >= 12);
    assert!(forecast.predicted_value.is_finite());
}
