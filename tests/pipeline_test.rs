//! End-to-end tests of the three stages over small corpora
use std::fs;
use std::path::{Path, PathBuf};

use corpus_graph::aggregate::Graph;
use corpus_graph::tokenizer::WordTokenizer;
use corpus_graph::util::test::write_corpus;
use corpus_graph::{BatchReport, GraphConfig, GraphError, Pipeline, Stage};
use tempfile::TempDir;

const CAT: &str = "the cat sat on the mat\n";

fn resources() -> PathBuf { PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests").join("resources") }

fn small_config(data_dir: &Path, output_dir: &Path) -> GraphConfig {
  let mut config = GraphConfig::new(data_dir, output_dir);
  config.window_size = 2;
  config.workers = Some(2);
  config
}

fn build(config: GraphConfig) -> (BatchReport, Graph) {
  let pipeline = Pipeline::new(config).unwrap();
  let report = pipeline.run().unwrap();
  let graph = Graph::load(pipeline.layout()).unwrap();
  (report, graph)
}

fn edge(first: &str, second: &str, weight: u64) -> (String, String, u64) {
  (first.to_string(), second.to_string(), weight)
}

fn graph_bytes(output_dir: &Path) -> (Vec<u8>, Vec<u8>) {
  (
    fs::read(output_dir.join("graph").join("vocabulary.tsv")).unwrap(),
    fs::read(output_dir.join("graph").join("edges.tsv")).unwrap(),
  )
}

#[test]
fn cat_sentence_graph() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("cat.txt", CAT)]);
  let (report, graph) = build(small_config(&data, &scratch.path().join("output")));

  assert_eq!(report.file_count, 1);
  assert_eq!(report.failures().count(), 0);
  assert_eq!(graph.node_count(), 5);
  assert_eq!(graph.count("the"), Some(2));
  assert_eq!(graph.count("mat"), Some(1));
  assert_eq!(graph.token_edges(), vec![
    edge("cat", "on", 1),
    edge("cat", "sat", 1),
    edge("cat", "the", 1),
    edge("mat", "on", 1),
    edge("mat", "the", 1),
    edge("on", "sat", 1),
    edge("on", "the", 1),
    edge("sat", "the", 2),
  ]);
  assert_eq!(graph.weight("the", "sat"), Some(2));
  assert_eq!(graph.weight("sat", "the"), Some(2));
  assert_eq!(graph.weight("cat", "mat"), None);
  assert_eq!(report.graph.total_weight, 9);
}

#[test]
fn identical_pairs_of_two_files_are_summed() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("one.txt", "a b\na b\na b\n"), ("two.txt", "b a\nb a\n")]);
  let mut config = small_config(&data, &scratch.path().join("output"));
  config.window_size = 1;
  let (_, graph) = build(config);
  assert_eq!(graph.token_edges(), vec![edge("a", "b", 5)]);
  assert_eq!(graph.count("a"), Some(5));
}

#[test]
fn rare_tokens_are_pruned_from_nodes_and_edges() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  let text = "rare common filler\n".repeat(4) + "common filler\n";
  write_corpus(&data, &[("rare.txt", text.as_str())]);
  let mut config = small_config(&data, &scratch.path().join("output"));
  config.window_size = 1;
  config.min_count = 5;
  let (report, graph) = build(config);

  assert_eq!(graph.count("rare"), None);
  assert_eq!(graph.node_count(), 2);
  assert_eq!(graph.token_edges(), vec![edge("common", "filler", 5)]);
  assert_eq!(report.graph.vocabulary_size, 3);
  assert_eq!(report.graph.pruned_vocabulary_size, 2);
  assert!(report.graph.dropped_pair_count > 0);
  assert!(graph.vocabulary.iter().all(|entry| entry.count >= 5));
}

#[test]
fn vocabulary_cap_keeps_the_most_frequent_tokens() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("xyz.txt", "x y z\nx y\nx\n")]);
  let mut config = small_config(&data, &scratch.path().join("output"));
  config.max_vocab_size = Some(2);
  let (_, graph) = build(config);

  assert_eq!(graph.node_count(), 2);
  assert_eq!(graph.count("x"), Some(3));
  assert_eq!(graph.count("y"), Some(2));
  assert_eq!(graph.token_edges(), vec![edge("x", "y", 2)]);
}

#[test]
fn empty_file_does_not_fail_the_batch() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("cat.txt", CAT), ("empty.txt", ""), ("blank.txt", "\n  \n")]);
  let (report, graph) = build(small_config(&data, &scratch.path().join("output")));
  assert_eq!(report.file_count, 3);
  assert_eq!(report.failures().count(), 0);
  assert_eq!(report.pairs.completed_count(), 3);
  assert_eq!(graph.node_count(), 5);
  assert_eq!(graph.edge_count(), 8);
}

#[test]
fn empty_corpus_gives_an_empty_graph_with_warnings() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  fs::create_dir_all(&data).unwrap();
  let (report, graph) = build(small_config(&data, &scratch.path().join("output")));
  assert_eq!(report.file_count, 0);
  assert_eq!(graph.node_count(), 0);
  assert_eq!(graph.edge_count(), 0);
  assert!(!report.warnings.is_empty());
}

#[test]
fn undecodable_file_is_skipped_without_artifacts() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("cat.txt", CAT)]);
  fs::write(data.join("bad.txt"), b"good start\n\xff\xfe\xfd\n").unwrap();
  let pipeline = Pipeline::new(small_config(&data, &scratch.path().join("output"))).unwrap();
  let report = pipeline.run().unwrap();

  let failures: Vec<_> = report.failures().collect();
  assert_eq!(failures.len(), 1);
  assert_eq!(failures[0].stage, Stage::Encode);
  assert!(failures[0].path.ends_with("bad.txt"));
  assert!(!pipeline.layout().dictionary_path("bad").exists());
  assert!(!pipeline.layout().encoded_path("bad").exists());
  assert!(!report.warnings.is_empty());

  let graph = Graph::load(pipeline.layout()).unwrap();
  assert_eq!(graph.count("good"), None);
  assert_eq!(graph.edge_count(), 8);
}

#[test]
fn missing_or_corrupt_artifacts_abort_aggregation() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("a.txt", CAT), ("b.txt", "a dog on the mat\n")]);
  let pipeline = Pipeline::new(small_config(&data, &scratch.path().join("output"))).unwrap();
  pipeline.run().unwrap();
  let keys = vec!["a".to_string(), "b".to_string()];
  assert!(pipeline.aggregate(&keys).is_ok());

  fs::remove_file(pipeline.layout().pairs_path("b")).unwrap();
  assert!(matches!(pipeline.aggregate(&keys), Err(GraphError::Aggregation { .. })));

  fs::write(pipeline.layout().dictionary_path("a"), "the\tnot-an-id\t2\n").unwrap();
  assert!(matches!(pipeline.aggregate(&keys), Err(GraphError::Aggregation { .. })));

  let unknown = vec!["never_encoded".to_string()];
  assert!(matches!(pipeline.aggregate(&unknown), Err(GraphError::Aggregation { .. })));
}

#[test]
fn out_of_range_local_ids_abort_aggregation() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("a.txt", CAT)]);
  let pipeline = Pipeline::new(small_config(&data, &scratch.path().join("output"))).unwrap();
  pipeline.run().unwrap();
  fs::write(pipeline.layout().pairs_path("a"), "0\t99\t1\n").unwrap();
  assert!(matches!(
    pipeline.aggregate(&["a".to_string()]),
    Err(GraphError::Aggregation { .. })
  ));
}

#[test]
fn output_does_not_depend_on_file_order_or_workers() {
  let files = [
    ("AA/wiki_00.txt", "the cat sat on the mat\nthe dog sat\n"),
    ("AA/wiki_01.txt", "a dog and a cat\n"),
    ("AB/wiki_00.txt", "mat and hat\nthe hat\n"),
  ];
  let scratch = TempDir::new().unwrap();

  let forward = scratch.path().join("forward");
  write_corpus(&forward.join("corpus"), &files);
  let mut config = small_config(&forward.join("corpus"), &forward.join("output"));
  config.workers = Some(1);
  build(config);

  let backward = scratch.path().join("backward");
  let reversed: Vec<(&str, &str)> = files.iter().rev().cloned().collect();
  write_corpus(&backward.join("corpus"), &reversed);
  let mut config = small_config(&backward.join("corpus"), &backward.join("output"));
  config.workers = Some(4);
  build(config);

  assert_eq!(graph_bytes(&forward.join("output")), graph_bytes(&backward.join("output")));
}

#[test]
fn rerunning_is_idempotent() {
  let scratch = TempDir::new().unwrap();
  let output = scratch.path().join("output");
  let mut config = small_config(&resources(), &output);
  config.file_extension = Some(".txt".to_string());

  build(config.clone());
  let first = graph_bytes(&output);
  build(config);
  assert_eq!(first, graph_bytes(&output));
}

#[test]
fn resume_keeps_existing_artifacts() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  let output = scratch.path().join("output");
  write_corpus(&data, &[("cat.txt", CAT)]);
  build(small_config(&data, &output));

  write_corpus(&data, &[("cat.txt", "dog bites man\n")]);
  let mut config = small_config(&data, &output);
  config.resume = true;
  let (report, graph) = build(config);
  assert_eq!(report.encode.resumed, 1);
  assert_eq!(report.pairs.resumed, 1);
  assert_eq!(graph.count("cat"), Some(1));
  assert_eq!(graph.count("dog"), None);

  let (report, graph) = build(small_config(&data, &output));
  assert_eq!(report.encode.resumed, 0);
  assert_eq!(graph.count("dog"), Some(1));
  assert_eq!(graph.count("cat"), None);
}

#[test]
fn spilling_aggregation_matches_in_memory_aggregation() {
  let scratch = TempDir::new().unwrap();
  let mut config = small_config(&resources(), &scratch.path().join("memory"));
  config.file_extension = Some(".txt".to_string());
  let (in_memory_report, _) = build(config.clone());
  assert_eq!(in_memory_report.graph.spilled_runs, 0);

  config.output_dir = scratch.path().join("spilled");
  config.max_pairs_in_memory = 1;
  let (spilled_report, _) = build(config);
  assert!(spilled_report.graph.spilled_runs > 0);
  assert!(!scratch.path().join("spilled").join("graph").join(".spill").exists());

  assert_eq!(
    graph_bytes(&scratch.path().join("memory")),
    graph_bytes(&scratch.path().join("spilled"))
  );
  assert_eq!(in_memory_report.graph.edge_count, spilled_report.graph.edge_count);
  assert_eq!(in_memory_report.graph.total_weight, spilled_report.graph.total_weight);
}

#[test]
fn stages_can_run_one_at_a_time() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("a.txt", CAT), ("b.txt", "the dog sat\n")]);
  let pipeline = Pipeline::new(small_config(&data, &scratch.path().join("staged"))).unwrap();

  let files = pipeline.files().unwrap();
  let encoded = pipeline.encode_corpus(&files).unwrap();
  assert_eq!(encoded.completed_count(), 2);
  assert!(pipeline.completed_files(Stage::Pairs).unwrap().is_empty());

  let encoded_files = pipeline.completed_files(Stage::Encode).unwrap();
  let pairs = pipeline.extract_pairs(&encoded_files).unwrap();
  assert_eq!(pairs.keys(), vec!["a".to_string(), "b".to_string()]);
  let summary = pipeline.aggregate(&pairs.keys()).unwrap();
  assert_eq!(summary.file_count, 2);

  build(small_config(&data, &scratch.path().join("whole")));
  assert_eq!(
    graph_bytes(&scratch.path().join("staged")),
    graph_bytes(&scratch.path().join("whole"))
  );
}

#[test]
fn batch_report_is_written_next_to_the_graph() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("cat.txt", CAT)]);
  let pipeline = Pipeline::new(small_config(&data, &scratch.path().join("output"))).unwrap();
  pipeline.run().unwrap();

  let report_path = pipeline.layout().report_path();
  assert!(report_path.is_file());
  let report: serde_json::Value = serde_json::from_slice(&fs::read(report_path).unwrap()).unwrap();
  assert_eq!(report["file_count"], 1);
  assert_eq!(report["graph"]["edge_count"], 8);
  assert_eq!(report["encode"]["catalog"]["token_count"], 6);
}

#[test]
fn custom_tokenizer_replaces_the_named_one() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("cities.txt", "New York|is|big\n")]);
  let pipeline = Pipeline::new(small_config(&data, &scratch.path().join("output")))
    .unwrap()
    .with_tokenizer(WordTokenizer::custom(|sentence| {
      sentence.split('|').map(String::from).collect()
    }));
  pipeline.run().unwrap();
  let graph = Graph::load(pipeline.layout()).unwrap();
  assert_eq!(graph.node_count(), 3);
  assert_eq!(graph.weight("new york", "big"), Some(1));
}

#[test]
fn xml_corpus_reads_selected_nodes() {
  let scratch = TempDir::new().unwrap();
  let mut config = small_config(&resources(), &scratch.path().join("output"));
  config.file_parser = "xml".to_string();
  config.file_extension = Some(".xml".to_string());
  let (report, graph) = build(config);
  assert_eq!(report.file_count, 1);
  assert_eq!(report.encode.keys(), vec!["xml_wiki_sample".to_string()]);
  assert_eq!(graph.count("anarchism"), Some(2));
  assert_eq!(graph.count("autism"), Some(2));
  assert_eq!(graph.count("outside"), None);
}

#[test]
fn invalid_settings_are_rejected_at_construction() {
  let scratch = TempDir::new().unwrap();
  let base = small_config(scratch.path(), &scratch.path().join("output"));
  let mut broken = Vec::new();

  let mut config = base.clone();
  config.window_size = 0;
  broken.push(config);
  let mut config = base.clone();
  config.tokenizer = "Sentencepiece".to_string();
  broken.push(config);
  let mut config = base.clone();
  config.normalizer = "aggressive".to_string();
  broken.push(config);
  let mut config = base.clone();
  config.file_parser = "pdf".to_string();
  broken.push(config);
  let mut config = base.clone();
  config.max_vocab_size = Some(0);
  broken.push(config);
  let mut config = base.clone();
  config.workers = Some(0);
  broken.push(config);

  for config in broken {
    assert!(matches!(Pipeline::new(config), Err(GraphError::Configuration(_))));
  }
  assert!(Pipeline::new(base).is_ok());
}

#[test]
fn json_configuration_accepts_unlimited_vocabulary() {
  let scratch = TempDir::new().unwrap();
  let path = scratch.path().join("config.json");

  fs::write(&path, r#"{"data_dir": "corpus", "window_size": 3, "max_vocab_size": "unlimited"}"#).unwrap();
  let config = GraphConfig::from_json_file(&path).unwrap();
  assert_eq!(config.data_dir, PathBuf::from("corpus"));
  assert_eq!(config.window_size, 3);
  assert_eq!(config.max_vocab_size, None);
  assert_eq!(config.min_count, 1);
  assert_eq!(config.tokenizer, "WordPunct");

  fs::write(&path, r#"{"max_vocab_size": 10000, "min_count": 5}"#).unwrap();
  let config = GraphConfig::from_json_file(&path).unwrap();
  assert_eq!(config.max_vocab_size, Some(10000));
  assert_eq!(config.pruning_policy().min_count, 5);

  fs::write(&path, r#"{"max_vocab_size": null}"#).unwrap();
  assert_eq!(GraphConfig::from_json_file(&path).unwrap().max_vocab_size, None);

  fs::write(&path, r#"{"max_vocab_size": "plenty"}"#).unwrap();
  assert!(matches!(GraphConfig::from_json_file(&path), Err(GraphError::Json(_))));
}

#[test]
fn file_failing_on_rerun_loses_its_earlier_artifacts() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  write_corpus(&data, &[("a.txt", CAT), ("x.txt", "zebras graze here\n")]);
  let pipeline = Pipeline::new(small_config(&data, &scratch.path().join("output"))).unwrap();
  pipeline.run().unwrap();
  assert!(pipeline.layout().has_pairs("x"));

  fs::write(data.join("x.txt"), b"\xff\xfe\n").unwrap();
  let files = pipeline.files().unwrap();
  let encoded = pipeline.encode_corpus(&files).unwrap();
  assert_eq!(encoded.failures.len(), 1);
  assert!(!pipeline.layout().dictionary_path("x").exists());
  assert!(!pipeline.layout().encoded_path("x").exists());
  assert!(!pipeline.layout().pairs_path("x").exists());

  let encoded_files = pipeline.completed_files(Stage::Encode).unwrap();
  pipeline.extract_pairs(&encoded_files).unwrap();
  let keys: Vec<String> = pipeline
    .completed_files(Stage::Graph)
    .unwrap()
    .into_iter()
    .map(|file| file.key)
    .collect();
  assert_eq!(keys, vec!["a".to_string()]);

  pipeline.aggregate(&keys).unwrap();
  let graph = Graph::load(pipeline.layout()).unwrap();
  assert_eq!(graph.count("zebras"), None);
  assert_eq!(graph.edge_count(), 8);
}

#[test]
fn resume_after_reencoding_regenerates_pairs() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  let output = scratch.path().join("output");
  write_corpus(&data, &[("a.txt", CAT)]);
  build(small_config(&data, &output));

  // a rerun re-encodes the file, then stops before stage 2
  write_corpus(&data, &[("a.txt", "dog bites man\n")]);
  let pipeline = Pipeline::new(small_config(&data, &output)).unwrap();
  pipeline.encode_corpus(&pipeline.files().unwrap()).unwrap();
  assert!(!pipeline.layout().has_pairs("a"));
  assert!(pipeline.completed_files(Stage::Graph).unwrap().is_empty());

  let mut config = small_config(&data, &output);
  config.resume = true;
  let (report, graph) = build(config);
  assert_eq!(report.encode.resumed, 1);
  assert_eq!(report.pairs.resumed, 0);
  assert_eq!(graph.count("dog"), Some(1));
  assert_eq!(graph.count("cat"), None);
  assert_eq!(graph.token_edges(), vec![
    edge("bites", "dog", 1),
    edge("bites", "man", 1),
    edge("dog", "man", 1),
  ]);
}

#[test]
fn pairs_older_than_their_dictionary_are_not_resumed() {
  let scratch = TempDir::new().unwrap();
  let data = scratch.path().join("corpus");
  let output = scratch.path().join("output");
  write_corpus(&data, &[("a.txt", CAT)]);
  let pipeline = Pipeline::new(small_config(&data, &output)).unwrap();
  pipeline.run().unwrap();
  assert!(pipeline.layout().has_pairs("a"));

  // a dictionary rewritten after its pair counts makes them stale
  std::thread::sleep(std::time::Duration::from_millis(1100));
  let dictionary_path = pipeline.layout().dictionary_path("a");
  let dictionary = fs::read(&dictionary_path).unwrap();
  fs::write(&dictionary_path, dictionary).unwrap();
  assert!(!pipeline.layout().has_pairs("a"));
  assert!(pipeline.completed_files(Stage::Graph).unwrap().is_empty());

  let mut config = small_config(&data, &output);
  config.resume = true;
  let (report, graph) = build(config);
  assert_eq!(report.encode.resumed, 1);
  assert_eq!(report.pairs.resumed, 0);
  assert_eq!(graph.edge_count(), 8);
}
