//! The `run` flow: upload, train, evaluate and tear down one session.

use dtsim_storage::StoreConnector;
use dtsim_trainer::{
    class_names, DecisionTreeClassifier, EncodingTable, EvaluationResult, TabularParser,
    TrainEvaluatePipeline, TrainParams,
};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::error::{Result, WorkbenchError};
use crate::workbench::Workbench;

pub const TRAINING_SET: &str = "Training set";
pub const TEST_SET: &str = "Test set";

/// Inputs of one run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    pub train: PathBuf,
    pub test: Option<PathBuf>,
    pub sheet: String,
    pub target: String,
    pub features: Vec<String>,
    pub params: TrainParams,
    /// Leave the session's namespace in place after the run.
    pub keep: bool,
}

/// Everything a run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub model: DecisionTreeClassifier,
    pub encodings: EncodingTable,
    /// Display names of the model's classes, in class order.
    pub class_names: Vec<String>,
    /// Training-set results first, then test-set results if a test file was given.
    pub evaluations: Vec<(String, EvaluationResult)>,
}

impl RunOutcome {
    /// Evaluation results keyed by title.
    pub fn evaluations_json(&self) -> serde_json::Result<serde_json::Value> {
        let mut map = serde_json::Map::new();
        for (title, result) in &self.evaluations {
            map.insert(title.clone(), serde_json::to_value(result)?);
        }
        Ok(serde_json::Value::Object(map))
    }
}

/// Run in a fresh session opened on `connector`.
///
/// The session is torn down afterwards, whether or not the run succeeded,
/// unless `options.keep` is set. A failed teardown is logged and does not
/// replace the run's own result.
pub fn run_session<P: TabularParser>(
    connector: &StoreConnector,
    parser: P,
    options: &RunOptions,
) -> Result<RunOutcome> {
    let session = connector.open_session();
    info!(
        session = %session.session_id(),
        namespace = session.namespace(),
        "session opened"
    );

    let mut bench = Workbench::new(session, parser);
    let outcome = train_and_evaluate(&mut bench, options);

    if options.keep {
        info!(namespace = bench.session().namespace(), "keeping session data");
    } else if let Err(err) = bench.teardown() {
        warn!(
            session = %bench.session().session_id(),
            error = %err,
            "session teardown failed"
        );
    }

    outcome
}

/// Upload the training file, fit encoders and a tree on it, and evaluate on
/// the training data and on the optional test file.
///
/// The test file replaces the training upload in the session and is encoded
/// with the encoders fitted on the training data.
pub fn train_and_evaluate<P: TabularParser>(
    bench: &mut Workbench<P>,
    options: &RunOptions,
) -> Result<RunOutcome> {
    let pipeline = TrainEvaluatePipeline::new(options.params.clone())?;

    let mut columns = options.features.clone();
    columns.push(options.target.clone());

    bench.upload(&read_file(&options.train)?)?;
    let train = bench.table(&options.sheet)?.select(&columns)?;

    let encodings = EncodingTable::fit(&train, &columns)?;
    let encoded = encodings.apply(&train)?;
    let model = pipeline.train(&encoded, &options.features, &options.target)?;
    let classes = class_names(&encodings, &options.target, model.classes());

    let mut evaluations = vec![(
        TRAINING_SET.to_string(),
        pipeline.evaluate(&model, &encoded, &options.features, &options.target, &encodings)?,
    )];

    if let Some(test_path) = &options.test {
        bench.upload(&read_file(test_path)?)?;
        let test = bench.table(&options.sheet)?.select(&columns)?;
        let encoded_test = encodings.apply(&test)?;
        evaluations.push((
            TEST_SET.to_string(),
            pipeline.evaluate(
                &model,
                &encoded_test,
                &options.features,
                &options.target,
                &encodings,
            )?,
        ));
    }

    Ok(RunOutcome {
        model,
        encodings,
        class_names: classes,
        evaluations,
    })
}

fn read_file(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| WorkbenchError::Read {
        path: path.to_path_buf(),
        source,
    })
}
