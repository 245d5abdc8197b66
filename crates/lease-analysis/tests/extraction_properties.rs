//! Property tests: obligation extraction is total

use std::sync::Arc;

use lease_analysis::test_support::ScriptedModel;
use lease_analysis::ObligationExtractor;
use proptest::prelude::*;

fn extract(first: String, repair: String) -> Vec<lease_types::ObligationRecord> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let model = Arc::new(ScriptedModel::new().respond_with(first).respond_with(repair));
    let extractor = ObligationExtractor::new(model);
    runtime.block_on(extractor.extract_obligations("analysis text"))
}

fn json_ish() -> impl Strategy<Value = String> {
    prop_oneof![
        any::<String>(),
        "[\\[\\]{}\":, a-zA-Z0-9`]{0,80}",
        Just("[]".to_string()),
        Just("```json\n[{\"party\": \"Lessee\"}]\n```".to_string()),
        Just(
            "[{\"party\": \"Lessee\", \"description\": \"Pay rent\", \"enforceability\": \"mandatory\"}]"
                .to_string()
        ),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn extraction_never_returns_empty(first in json_ish(), repair in json_ish()) {
        let records = extract(first, repair);
        prop_assert!(!records.is_empty());
    }

    #[test]
    fn extracted_records_are_complete(first in json_ish(), repair in json_ish()) {
        for record in extract(first, repair) {
            prop_assert!(record.is_complete());
        }
    }
}
