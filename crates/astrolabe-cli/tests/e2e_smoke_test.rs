use std::{fs, path::PathBuf};

use tempfile::tempdir;

use astrolabe_cli::{Args, CliError, run};

/// Collects all .toml graph files from a directory
fn collect_graph_files(dir: PathBuf) -> Vec<PathBuf> {
    let mut files = if let Ok(entries) = fs::read_dir(&dir) {
        entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| {
                path.is_file() && path.extension().and_then(|s| s.to_str()) == Some("toml")
            })
            .collect()
    } else {
        Vec::new()
    };

    files.sort();
    files
}

fn demos_dir() -> PathBuf {
    // Demos are at workspace root, relative to workspace not the crate
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .parent()
        .unwrap()
        .join("demos")
}

fn args(input: PathBuf, output: PathBuf) -> Args {
    Args {
        input: input.to_string_lossy().to_string(),
        output: output.to_string_lossy().to_string(),
        layout: None,
        mode: None,
        settle_ms: 0,
        config: None,
        log_level: "off".to_string(),
    }
}

#[test]
fn e2e_smoke_test_demos() {
    let temp_dir = tempdir().expect("Failed to create temp directory");
    let demos = collect_graph_files(demos_dir());

    assert!(!demos.is_empty(), "No demo graphs found in demos/");

    let mut failed = Vec::new();

    for demo in &demos {
        let output_path = temp_dir.path().join(format!(
            "{}.out.toml",
            demo.file_stem().unwrap().to_string_lossy()
        ));

        match run(&args(demo.clone(), output_path.clone())) {
            Ok(()) => {
                let output = fs::read_to_string(&output_path).unwrap();
                assert!(output.contains("[[nodes]]"), "{} wrote no nodes", demo.display());
            }
            Err(e) => failed.push((demo.clone(), e)),
        }
    }

    if !failed.is_empty() {
        eprintln!("\nDemos that failed:");
        for (path, err) in &failed {
            eprintln!("  - {}: {}", path.display(), err);
        }
        panic!("{} demo(s) failed unexpectedly", failed.len());
    }
}

#[test]
fn e2e_named_layout_and_routed_connections() {
    let temp_dir = tempdir().unwrap();
    let output_path = temp_dir.path().join("mesh.toml");
    let mut args = args(demos_dir().join("service_mesh.toml"), output_path.clone());
    args.layout = Some("grid".to_string());

    run(&args).unwrap();

    let output: toml::Table = fs::read_to_string(&output_path).unwrap().parse().unwrap();
    assert_eq!(output["mode"].as_str(), Some("standard"));
    assert_eq!(output["nodes"].as_array().unwrap().len(), 6);
    assert_eq!(output["connections"].as_array().unwrap().len(), 3);
}

#[test]
fn e2e_invalid_inputs_fail() {
    let temp_dir = tempdir().unwrap();
    let output_path = temp_dir.path().join("out.toml");

    let broken = temp_dir.path().join("broken.toml");
    fs::write(&broken, "[[nodes]]\nid = \n").unwrap();
    assert!(matches!(
        run(&args(broken, output_path.clone())),
        Err(CliError::Input { .. })
    ));

    let missing = temp_dir.path().join("missing.toml");
    assert!(matches!(
        run(&args(missing, output_path.clone())),
        Err(CliError::Io(_))
    ));

    let mut bad_mode = args(demos_dir().join("org_chart.toml"), output_path.clone());
    bad_mode.mode = Some("sideways".to_string());
    assert!(matches!(run(&bad_mode), Err(CliError::Invalid(_))));

    let mut bad_layout = args(demos_dir().join("org_chart.toml"), output_path);
    bad_layout.layout = Some("spiral".to_string());
    assert!(matches!(run(&bad_layout), Err(CliError::Layout(_))));
}
