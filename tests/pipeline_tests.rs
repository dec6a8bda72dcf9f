use std::collections::HashSet;
use std::fs;
use std::io::Cursor;
use std::path::Path;

mod common;
use common::{
    close, diatomic, header, write_text, Workspace, SCENARIO_STATES, SCENARIO_TRANS,
};
use linelist_lumper::config::{ElectronicTermMap, LumpingOptions, MoleculeConfig, MoleculeInputs};
use linelist_lumper::linelist::{StatesReader, TransitionsReader};
use linelist_lumper::model::{OriginalState, Transition};
use linelist_lumper::quality::DataQualityWarning;
use linelist_lumper::schema::files;
use linelist_lumper::{
    lump_molecule, process_molecule, run_batch, LifetimeSummation, LumpError, LumpResult,
    MoleculeResult,
};

fn states_from(cfg: &MoleculeConfig, text: &str) -> Vec<LumpResult<OriginalState>> {
    let schema = cfg.validate().expect("valid config");
    StatesReader::new(Cursor::new(text.to_string()), &schema, Path::new("mem.states")).collect()
}

fn transitions_from(records: &[(u64, u64, f64)]) -> Vec<LumpResult<Transition>> {
    records
        .iter()
        .map(|&(i, f, a)| Ok(Transition::new(i, f, a)))
        .collect()
}

fn lump_scenario(options: &LumpingOptions) -> MoleculeResult {
    let cfg = diatomic("XY");
    lump_molecule(
        &cfg,
        states_from(&cfg, SCENARIO_STATES),
        transitions_from(&[(2, 1, 5.0), (3, 1, 2.0), (3, 2, 3.0)]),
        options,
    )
    .expect("scenario lumps")
}

#[test]
fn worked_scenario_lumps_and_lifetimes() {
    let result = lump_scenario(&LumpingOptions::default());

    assert_eq!(result.catalogue.len(), 2);
    let a = &result.catalogue[0];
    let b = &result.catalogue[1];
    assert_eq!(a.key, vec!["X".to_string(), "0".to_string()]);
    assert_eq!(a.members, vec![1, 2]);
    assert_eq!(b.key, vec!["X".to_string(), "1".to_string()]);
    assert_eq!(b.members, vec![3]);

    assert!(close(a.energy.unwrap(), 0.0));
    assert!(close(b.energy.unwrap(), 1.0));

    assert_eq!(result.transitions.len(), 1);
    let t = result.transitions[0];
    assert_eq!((t.initial, t.final_), (1, 0));
    assert!(close(t.partial_lifetime, 0.416_666_666_666_666_6));
    assert_eq!(t.lump_size, 2);

    assert!(close(b.total_lifetime, 2.4));
    assert!(a.total_lifetime.is_infinite());

    assert_eq!(result.stats.records, 3);
    assert_eq!(result.stats.discarded_intra_lump, 1);
    // the ground state never decays, which is still surfaced for review
    assert_eq!(
        result.warnings,
        vec![DataQualityWarning::InfiniteLifetime { lump: 0 }]
    );
}

#[test]
fn rate_summation_is_opt_in() {
    let result = lump_scenario(&LumpingOptions {
        lifetime_summation: LifetimeSummation::PartialRates,
        ..Default::default()
    });
    assert!(close(result.catalogue[1].total_lifetime, 0.416_666_666_666_666_6));
}

/// Two electronic states, three vibrational levels, J up to 2.
fn synthetic_states() -> String {
    let mut out = String::new();
    let mut id = 1;
    for (el, offset) in [("X", 0.0), ("A", 9000.0)] {
        for v in 0..3 {
            for j in 0..3 {
                let energy = offset + 2000.0 * v as f64 + 10.0 * (j * (j + 1)) as f64;
                let g = 2 * j + 1;
                out.push_str(&format!("{id} {energy:.4} {g} {j} NaN {el} {v}\n"));
                id += 1;
            }
        }
    }
    out
}

fn synthetic_transitions(n: u64) -> Vec<(u64, u64, f64)> {
    let mut out = Vec::new();
    for i in 1..=n {
        for f in 1..=n {
            if i != f {
                out.push((i, f, (i * 7 + f) as f64 * 0.01));
            }
        }
    }
    out
}

#[test]
fn structural_properties_hold() {
    let mut cfg = diatomic("XY");
    cfg.energy_max = Some(12000.0);
    let text = synthetic_states();
    let raw = synthetic_transitions(18);
    let result = lump_molecule(
        &cfg,
        states_from(&cfg, &text),
        transitions_from(&raw),
        &LumpingOptions::default(),
    )
    .unwrap();

    // partition
    let kept: HashSet<u64> = states_from(&cfg, &text)
        .into_iter()
        .map(|s| s.unwrap())
        .filter(|s| s.energy <= 12000.0)
        .map(|s| s.id)
        .collect();
    let mut union = HashSet::new();
    for lump in &result.catalogue {
        for id in &lump.members {
            assert!(union.insert(*id));
        }
    }
    assert_eq!(union, kept);

    // energy bound: lowest-J members of each lump are the J = 0 rows
    let all: Vec<OriginalState> = states_from(&cfg, &text)
        .into_iter()
        .map(|s| s.unwrap())
        .collect();
    for lump in &result.catalogue {
        let lowest: Vec<f64> = all
            .iter()
            .filter(|s| lump.members.contains(&s.id) && s.angular_momentum == 0.0)
            .map(|s| s.energy)
            .collect();
        let lo = lowest.iter().cloned().fold(f64::INFINITY, f64::min);
        let hi = lowest.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let e = lump.energy.unwrap();
        assert!(lo <= e && e <= hi);
    }

    // no self transitions
    assert!(result.transitions.iter().all(|t| t.initial != t.final_));

    // monotonic discard: dropping every record touching a filtered-out state
    // changes nothing
    let pruned: Vec<(u64, u64, f64)> = raw
        .iter()
        .copied()
        .filter(|(i, f, _)| kept.contains(i) && kept.contains(f))
        .collect();
    let again = lump_molecule(
        &cfg,
        states_from(&cfg, &text),
        transitions_from(&pruned),
        &LumpingOptions::default(),
    )
    .unwrap();
    assert_eq!(result.transitions, again.transitions);
    assert_eq!(
        result.stats.discarded_filtered,
        (raw.len() - pruned.len()) as u64
    );
}

#[test]
fn lumping_is_reproducible() {
    let cfg = diatomic("XY");
    let text = synthetic_states();
    let raw = synthetic_transitions(18);
    let run = || {
        lump_molecule(
            &cfg,
            states_from(&cfg, &text),
            transitions_from(&raw),
            &LumpingOptions::default(),
        )
        .unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first.catalogue, second.catalogue);
    assert_eq!(first.membership, second.membership);
    assert_eq!(first.transitions, second.transitions);
}

#[test]
fn process_molecule_writes_every_artefact() {
    let ws = Workspace::new();
    let cfg = diatomic("XY");
    ws.write_dataset(&cfg, SCENARIO_STATES, &[SCENARIO_TRANS]);

    let mut options = ws.options();
    options.lumping.include_original_lifetimes = true;
    process_molecule(&cfg, &options).unwrap();

    let out = ws.output_dir().join("XY");
    for name in [
        files::STATES_DATA,
        files::STATES_ELECTRONIC,
        files::STATES_VIBRATIONAL,
        files::TRANSITIONS_DATA,
        files::COMPOSITE_MAP,
        files::ORIGINAL_TAU,
        files::METADATA,
    ] {
        assert!(out.join(name).is_file(), "{name} missing");
    }

    let transitions = fs::read_to_string(out.join(files::TRANSITIONS_DATA)).unwrap();
    let mut lines = transitions.lines();
    assert_eq!(lines.next(), Some("i,f,tau_if,lump_size"));
    assert!(lines.next().unwrap().starts_with("1,0,0.41666"));

    let states = fs::read_to_string(out.join(files::STATES_DATA)).unwrap();
    assert_eq!(states.lines().next(), Some("i,E,tau,lump_size,J(E)"));
    assert_eq!(states.lines().count(), 3);

    let vib = fs::read_to_string(out.join(files::STATES_VIBRATIONAL)).unwrap();
    assert_eq!(vib.lines().collect::<Vec<_>>(), vec!["i,v", "0,0", "1,1"]);

    let map: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(files::COMPOSITE_MAP)).unwrap())
            .unwrap();
    assert_eq!(map["0"], serde_json::json!([1, 2]));
    assert_eq!(map["1"], serde_json::json!([3]));

    let taus: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(files::ORIGINAL_TAU)).unwrap())
            .unwrap();
    assert_eq!(taus["1"], serde_json::json!([0.4]));

    let meta: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(out.join(files::METADATA)).unwrap()).unwrap();
    assert_eq!(meta["input"]["dataset_name"], "Test");
    assert_eq!(meta["aggregation"]["records"], 3);
    assert_eq!(meta["aggregation"]["discarded_intra_lump"], 1);
    assert_eq!(meta["lifetime_summation"], "partial-lifetimes");
    assert!(meta["processed_on"].is_string());
    assert!(meta["run_id"].is_string());
}

#[test]
fn split_transition_files_match_single_file() {
    let ws = Workspace::new();
    let single = diatomic("AB");
    ws.write_dataset(&single, SCENARIO_STATES, &[SCENARIO_TRANS]);
    let split = diatomic("CD");
    ws.write_dataset(&split, SCENARIO_STATES, &["2 1 5.0\n3 1 2.0\n", "3 2 3.0\n"]);

    let options = ws.options();
    let a = process_molecule(&single, &options).unwrap();
    let b = process_molecule(&split, &options).unwrap();
    assert_eq!(a.transitions, b.transitions);
    assert_eq!(a.catalogue, b.catalogue);
}

#[test]
fn compressed_dataset_matches_plain_one() {
    let ws = Workspace::new();
    let plain = diatomic("AB");
    ws.write_dataset(&plain, SCENARIO_STATES, &[SCENARIO_TRANS]);
    let packed = diatomic("CD");
    ws.write_compressed_dataset(&packed, SCENARIO_STATES, &["2 1 5.0\n3 1 2.0\n", "3 2 3.0\n"]);

    let options = ws.options();
    let a = process_molecule(&plain, &options).unwrap();
    let b = process_molecule(&packed, &options).unwrap();
    assert_eq!(a.catalogue, b.catalogue);
    assert_eq!(a.transitions, b.transitions);
    assert!(close(b.catalogue[1].total_lifetime, 2.4));
    assert!(ws
        .output_dir()
        .join("CD")
        .join(files::TRANSITIONS_DATA)
        .is_file());
}

#[test]
fn refuses_non_empty_output_directory() {
    let ws = Workspace::new();
    let cfg = diatomic("XY");
    ws.write_dataset(&cfg, SCENARIO_STATES, &[SCENARIO_TRANS]);
    process_molecule(&cfg, &ws.options()).unwrap();

    let err = process_molecule(&cfg, &ws.options()).unwrap_err();
    assert!(matches!(err, LumpError::OutputExists(_)));
}

#[test]
fn electronic_terms_are_added_to_electronic_table() {
    let ws = Workspace::new();
    let cfg = diatomic("XY");
    ws.write_dataset(&cfg, SCENARIO_STATES, &[SCENARIO_TRANS]);

    let terms_path = ws.root.path().join("terms.json");
    write_text(
        &terms_path,
        r#"{"XY": [{"labels": ["X"], "term": "X(2SIGMA+)"}]}"#,
    );
    let mut options = ws.options();
    options.electronic_terms = Some(ElectronicTermMap::from_path(&terms_path).unwrap());
    process_molecule(&cfg, &options).unwrap();

    let el = fs::read_to_string(ws.output_dir().join("XY").join(files::STATES_ELECTRONIC))
        .unwrap();
    assert_eq!(
        el.lines().collect::<Vec<_>>(),
        vec!["i,State,term", "0,X,X(2SIGMA+)", "1,X,X(2SIGMA+)"]
    );
}

#[test]
fn batch_isolates_failing_molecules() {
    let ws = Workspace::new();

    let good = diatomic("AB");
    ws.write_dataset(&good, SCENARIO_STATES, &[SCENARIO_TRANS]);

    // declares one column too many for its states file
    let mut bad_columns = diatomic("CD");
    bad_columns.states_header = header(&["i", "E", "g_tot", "J", "tau", "State", "v", "Omega"]);
    ws.write_dataset(&bad_columns, SCENARIO_STATES, &[SCENARIO_TRANS]);

    let mut exhausted = diatomic("EF");
    exhausted.only_with.insert("State".into(), "B".into());
    ws.write_dataset(&exhausted, SCENARIO_STATES, &[SCENARIO_TRANS]);

    let inputs_json = serde_json::json!({
        "AB": good,
        "CD": bad_columns,
        "EF": exhausted,
    });
    let inputs = MoleculeInputs::from_json(&inputs_json.to_string()).unwrap();

    let report = run_batch(&inputs, &[], &ws.options());
    assert!(!report.is_success());
    assert_eq!(report.processed.len(), 1);
    assert_eq!(report.processed[0].formula, "AB");
    assert_eq!(report.processed[0].lumped_states, 2);

    assert_eq!(report.failed.len(), 2);
    let cd = report.failed.iter().find(|f| f.formula == "CD").unwrap();
    match &cd.error {
        LumpError::Configuration { molecule, reason } => {
            assert_eq!(molecule, "CD");
            assert!(reason.contains("columns"));
        }
        other => panic!("unexpected error: {other}"),
    }
    let ef = report.failed.iter().find(|f| f.formula == "EF").unwrap();
    match &ef.error {
        LumpError::FilterExhaustion {
            molecule,
            predicate,
        } => {
            assert_eq!(molecule, "EF");
            assert!(predicate.contains("State == B"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn batch_follows_inputs_file_order() {
    let ws = Workspace::new();
    // no data written: both fail at dataset lookup, in file order
    let zz = diatomic("ZZ");
    let aa = diatomic("AA");
    let json = format!(
        r#"{{"ZZ": {}, "AA": {}}}"#,
        serde_json::to_string(&zz).unwrap(),
        serde_json::to_string(&aa).unwrap()
    );
    let inputs = MoleculeInputs::from_json(&json).unwrap();

    let report = run_batch(&inputs, &[], &ws.options());
    let order: Vec<&str> = report.failed.iter().map(|f| f.formula.as_str()).collect();
    assert_eq!(order, vec!["ZZ", "AA"]);
}

#[test]
fn unknown_selected_molecule_is_reported() {
    let ws = Workspace::new();
    let inputs = MoleculeInputs::from_json("{}").unwrap();
    let report = run_batch(&inputs, &["ZZ".to_string()], &ws.options());
    assert_eq!(report.failed.len(), 1);
    assert!(matches!(
        report.failed[0].error,
        LumpError::Configuration { .. }
    ));
}

#[test]
fn every_infinite_lifetime_is_flagged() {
    // only an intra-lump transition: neither lump decays
    let cfg = diatomic("XY");
    let result = lump_molecule(
        &cfg,
        states_from(&cfg, SCENARIO_STATES),
        transitions_from(&[(2, 1, 5.0)]),
        &LumpingOptions::default(),
    )
    .unwrap();
    assert_eq!(
        result.warnings,
        vec![
            DataQualityWarning::InfiniteLifetime { lump: 0 },
            DataQualityWarning::InfiniteLifetime { lump: 1 },
        ]
    );
}

#[test]
fn transitions_reader_feeds_the_pipeline() {
    let ws = Workspace::new();
    let path = ws.root.path().join("x.trans");
    write_text(&path, SCENARIO_TRANS);
    let cfg = diatomic("XY");
    let result = lump_molecule(
        &cfg,
        states_from(&cfg, SCENARIO_STATES),
        TransitionsReader::new(&[path]),
        &LumpingOptions::default(),
    )
    .unwrap();
    assert!(close(result.catalogue[1].total_lifetime, 2.4));
}
