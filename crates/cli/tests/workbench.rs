//! End-to-end session flow over the in-memory store.

use dtsim_cli::{report, Workbench, WorkbenchError};
use dtsim_storage::{MemoryBlobService, SessionState, StorageError, StoreConfig, StoreConnector};
use dtsim_trainer::{
    CsvParser, EncodingTable, TrainEvaluatePipeline, TrainParams, TrainerError, DEFAULT_SHEET,
};
use std::sync::Arc;

const TRAIN: &[u8] = b"outlook,windy,play\n\
sunny,no,no\n\
sunny,yes,no\n\
overcast,no,yes\n\
rain,no,yes\n\
rain,yes,no\n\
overcast,yes,yes\n";

const TEST: &[u8] = b"outlook,windy,play\n\
overcast,no,yes\n\
rain,no,yes\n";

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn bench() -> Workbench<CsvParser> {
    let connector = StoreConnector::container(Arc::new(MemoryBlobService::new()));
    Workbench::new(connector.open_session(), CsvParser::default())
}

#[test]
fn test_state_follows_uploads_and_parses() {
    let mut bench = bench();
    assert_eq!(bench.state(), &SessionState::Empty);

    let key = bench.upload(TRAIN).unwrap();
    assert_eq!(bench.state(), &SessionState::Uploaded { key: key.clone() });

    assert_eq!(bench.table(DEFAULT_SHEET).unwrap().len(), 6);
    assert_eq!(bench.state(), &SessionState::Parsed { key: key.clone() });

    bench.upload(TEST).unwrap();
    assert_eq!(bench.state(), &SessionState::Stale { key: key.clone() });

    // The stale cache is replaced by the new upload.
    assert_eq!(bench.table(DEFAULT_SHEET).unwrap().len(), 2);
    assert_eq!(bench.state(), &SessionState::Parsed { key });
}

#[test]
fn test_nothing_uploaded() {
    let mut bench = bench();
    assert!(matches!(
        bench.table(DEFAULT_SHEET),
        Err(WorkbenchError::Storage(StorageError::NothingUploaded))
    ));
    assert!(matches!(
        bench.sheet_names(),
        Err(WorkbenchError::Storage(StorageError::NothingUploaded))
    ));
}

#[test]
fn test_unknown_sheet() {
    let mut bench = bench();
    bench.upload(TRAIN).unwrap();
    assert_eq!(bench.sheet_names().unwrap(), vec![DEFAULT_SHEET.to_string()]);
    assert!(matches!(
        bench.table("Summary"),
        Err(WorkbenchError::Trainer(TrainerError::UnknownSheet(_)))
    ));
}

#[test]
fn test_teardown_erases_upload() {
    let mut bench = bench();
    let key = bench.upload(TRAIN).unwrap();
    bench.table(DEFAULT_SHEET).unwrap();

    bench.teardown().unwrap();

    assert_eq!(bench.state(), &SessionState::Empty);
    assert!(bench.session().retrieve(&key).unwrap_err().is_not_found());
}

#[test]
fn test_train_then_evaluate_test_upload() {
    let mut bench = bench();
    let columns = names(&["outlook", "windy", "play"]);
    let features = names(&["outlook", "windy"]);

    bench.upload(TRAIN).unwrap();
    let train = bench.table(DEFAULT_SHEET).unwrap().select(&columns).unwrap();
    let encodings = EncodingTable::fit(&train, &columns).unwrap();

    let pipeline = TrainEvaluatePipeline::new(TrainParams {
        max_depth: 3,
        ..TrainParams::default()
    })
    .unwrap();
    let model = pipeline
        .train(&encodings.apply(&train).unwrap(), &features, "play")
        .unwrap();

    bench.upload(TEST).unwrap();
    let test = bench.table(DEFAULT_SHEET).unwrap().select(&columns).unwrap();
    let result = pipeline
        .evaluate(
            &model,
            &encodings.apply(&test).unwrap(),
            &features,
            "play",
            &encodings,
        )
        .unwrap();

    // "no" never occurs in the test upload but stays in the matrix.
    assert_eq!(result.confusion_matrix.labels(), &["no", "yes"]);
    assert_eq!(result.confusion_matrix.row("no"), Some(&[0, 0][..]));
    assert_eq!(result.accuracy, 1.0);

    let text = report::render_evaluation("Test set", &result);
    assert!(text.contains("accuracy   1.0000"));
    assert!(text.contains("yes"));
}

#[test]
fn test_memory_backend_from_config() {
    let connector = StoreConnector::from_config(&StoreConfig::memory()).unwrap();
    let mut bench = Workbench::new(connector.open_session(), CsvParser::default());
    bench.upload(TRAIN).unwrap();
    assert_eq!(
        bench.table(DEFAULT_SHEET).unwrap().column_names(),
        vec!["outlook", "windy", "play"]
    );
}
