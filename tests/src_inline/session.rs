use std::io::Cursor;

use image::{Rgb, RgbImage};

use super::*;
use crate::test_support::{FIXTURE_TAXONOMY, make_temp_dir, write_file, write_taxonomy_fixture};

fn session(data_dir: &Path) -> Session {
    Session::new(&SessionConfig {
        data_dir: data_dir.to_path_buf(),
        ttl: Duration::from_secs(120),
        max_entries: 1,
    })
}

fn run_lines(session: &mut Session, input: &str) -> (SessionStats, Vec<Value>) {
    let mut out = Vec::new();
    let stats = run_session(session, Cursor::new(input), &mut out).unwrap();
    let responses = String::from_utf8(out)
        .unwrap()
        .lines()
        .map(|l| serde_json::from_str(l).unwrap())
        .collect();
    (stats, responses)
}

#[test]
fn test_rank_request_memoizes_master_list() {
    let dir = make_temp_dir("session_rank");
    write_taxonomy_fixture(&dir, true);
    let mut s = session(&dir);

    let input = format!(
        "{{\"op\":\"rank\",\"taxonomy_id\":{FIXTURE_TAXONOMY},\"top\":1}}\n\n{{\"op\":\"rank\",\"taxonomy_id\":{FIXTURE_TAXONOMY},\"weights\":{{\"aff_w\":0.0}}}}\n"
    );
    let (stats, responses) = run_lines(&mut s, &input);

    assert_eq!(stats, SessionStats { requests: 2, failed: 0 });
    assert_eq!(responses[0]["ok"], true);
    assert_eq!(responses[0]["cached"], false);
    assert_eq!(responses[0]["summary"]["top"].as_array().unwrap().len(), 1);
    assert_eq!(responses[0]["summary"]["top"][0]["peptide"], "AAAA");
    assert_eq!(responses[1]["cached"], true);
    assert_eq!(responses[1]["summary"]["weights"]["aff_w"], 0.0);
    assert_eq!(responses[1]["summary"]["assays"]["matched_rows"], 3);
}

#[test]
fn test_changed_source_file_misses_cache() {
    let dir = make_temp_dir("session_change");
    write_taxonomy_fixture(&dir, false);
    let mut s = session(&dir);
    let line = format!("{{\"op\":\"rank\",\"taxonomy_id\":{FIXTURE_TAXONOMY}}}");

    assert_eq!(s.handle_line(&line)["cached"], false);
    assert_eq!(s.handle_line(&line)["cached"], true);

    write_file(
        &dir.join(format!("immunogenicity_peptides_{FIXTURE_TAXONOMY}.tsv")),
        "peptide\timmunogenicity_score\nAAAA\t0.9\nBBBB\t0.3\nCCCC\t-0.2\n",
    );
    assert_eq!(s.handle_line(&line)["cached"], false);
}

#[test]
fn test_malformed_requests_do_not_stop_loop() {
    let dir = make_temp_dir("session_bad");
    let mut s = session(&dir);
    let input = "not json\n{\"op\":\"explode\"}\n{\"op\":\"rank\",\"taxonomy_id\":404}\n";
    let (stats, responses) = run_lines(&mut s, input);

    assert_eq!(stats, SessionStats { requests: 3, failed: 3 });
    assert!(responses.iter().all(|r| r["ok"] == false));
    assert!(responses[0]["error"].as_str().unwrap().starts_with("invalid request"));
    assert!(
        responses[2]["error"]
            .as_str()
            .unwrap()
            .contains("mhci_peptides_404.tsv")
    );
}

#[test]
fn test_split_alleles_request() {
    let dir = make_temp_dir("session_split");
    let src = dir.join("alleles.txt");
    let text: String = (0..9).map(|i| format!("HLA-A*0{}:01,9\n", i)).collect();
    write_file(&src, &text);
    let mut s = session(&dir);

    let request = json!({
        "op": "split_alleles",
        "allele_file": src,
        "out_dir": dir.join("chunks"),
    });
    let response = s.handle_line(&request.to_string());
    assert_eq!(response["ok"], true);
    assert_eq!(response["result"]["outcome"], "split");
    assert_eq!(response["result"]["paths"].as_array().unwrap().len(), 3);
}

#[test]
fn test_detect_request_memoizes_detections() {
    let dir = make_temp_dir("session_detect");
    let image = dir.join("img.png");
    RgbImage::from_pixel(64, 64, Rgb([10, 20, 30])).save(&image).unwrap();
    let predictions = dir.join("pred.json");
    write_file(
        &predictions,
        r#"{"boxes": [[5, 5, 30, 30], [6, 6, 31, 31]], "scores": [0.9, 0.8], "labels": [0, 1]}"#,
    );
    let mut s = session(&dir);

    let request = json!({
        "op": "detect",
        "image": image,
        "predictions": predictions,
        "conf_threshold": 0.5,
        "iou_threshold": 0.5,
        "out": dir.join("annotated.png"),
    });
    let first = s.handle_line(&request.to_string());
    assert_eq!(first["ok"], true);
    assert_eq!(first["cached"], false);
    assert_eq!(first["detections"].as_array().unwrap().len(), 1);
    assert_eq!(first["detections"][0]["text"], "0-0.90");
    assert!(dir.join("annotated.png").exists());

    let second = s.handle_line(&request.to_string());
    assert_eq!(second["cached"], true);

    let mut other = request.clone();
    other["iou_threshold"] = json!(0.95);
    let third = s.handle_line(&other.to_string());
    assert_eq!(third["cached"], false);
    assert_eq!(third["detections"].as_array().unwrap().len(), 2);
}

#[test]
fn test_keys_depend_on_content() {
    let dir = make_temp_dir("session_keys");
    write_taxonomy_fixture(&dir, false);
    let files = TaxonomyFiles::discover(&dir, FIXTURE_TAXONOMY);
    let lenient = master_key(&files, &Stage1Params::default()).unwrap();
    let strict = master_key(&files, &Stage1Params { strict_joins: true }).unwrap();
    assert_ne!(lenient, strict);
    assert_eq!(lenient, master_key(&files, &Stage1Params::default()).unwrap());
}
