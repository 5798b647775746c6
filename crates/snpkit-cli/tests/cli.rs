use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

const VCF: &str = "\
##fileformat=VCFv4.2
#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3\tS4
1\t100\trs1\tA\tG\t.\tPASS\t.\tGT\t0/0\t0/1\t1/1\t0/1
1\t200\trs2\tC\tT\t.\tPASS\t.\tGT\t0/0\t0/1\t1/1\t0/1
1\t300\trs3\tG\tA\t.\tPASS\t.\tGT\t0/0\t0/0\t0/0\t0/0
2\t150\trs4\tT\tC\t.\tPASS\t.\tGT\t./.\t1/1\t0/0\t0/1
";

const CSV: &str = "\
id,chrom,pos,ref,alt,S4,S5
rs1,1,100,A,G,2,0
rs2,1,200,C,T,1,1
";

fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

fn snpkit(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_snpkit"))
        .args(args)
        .output()
        .expect("failed to launch snpkit")
}

fn run_ok(args: &[&str]) -> String {
    let out = snpkit(args);
    assert!(
        out.status.success(),
        "snpkit {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8(out.stdout).unwrap()
}

/// Parse a TSV with a header row into maps keyed by column name.
fn read_table(text: &str) -> Vec<HashMap<String, String>> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .from_reader(text.as_bytes());
    let headers = rdr.headers().unwrap().clone();
    rdr.records()
        .map(|r| {
            let r = r.unwrap();
            headers
                .iter()
                .zip(r.iter())
                .map(|(h, v)| (h.to_string(), v.to_string()))
                .collect()
        })
        .collect()
}

fn metrics(text: &str) -> HashMap<String, usize> {
    read_table(text)
        .into_iter()
        .map(|row| (row["metric"].clone(), row["value"].parse().unwrap()))
        .collect()
}

fn str_of(p: &Path) -> &str {
    p.to_str().unwrap()
}

#[test]
fn summary_reports_merge_and_filter() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = write(dir.path(), "a.vcf", VCF);
    let csv_path = write(dir.path(), "b.csv", CSV);
    let conflicts = dir.path().join("conflicts.tsv");
    let exclusions = dir.path().join("excluded.tsv");

    let out = run_ok(&[
        "summary",
        "--input",
        str_of(&vcf),
        str_of(&csv_path),
        "--conflicts",
        str_of(&conflicts),
        "--exclusions",
        str_of(&exclusions),
    ]);
    let m = metrics(&out);
    assert_eq!(m["files"], 2);
    assert_eq!(m["records"], 6);
    assert_eq!(m["rejected_rows"], 0);
    assert_eq!(m["merge_conflicts"], 2);
    assert_eq!(m["loaded_samples"], 5);
    assert_eq!(m["loaded_variants"], 4);
    assert_eq!(m["excluded_variants"], 2);
    assert_eq!(m["excluded_samples"], 0);
    assert_eq!(m["samples"], 5);
    assert_eq!(m["variants"], 2);

    let rows = read_table(&fs::read_to_string(&conflicts).unwrap());
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0]["sample_id"], "S4");
    assert_eq!(rows[0]["pos"], "100");
    assert_eq!(rows[0]["previous"], "1");
    assert_eq!(rows[0]["replacement"], "2");
    assert!(rows[0]["replacement_source"].ends_with("b.csv"));

    let excluded = read_table(&fs::read_to_string(&exclusions).unwrap());
    assert!(excluded
        .iter()
        .any(|r| r["id"] == "2:150" && r["threshold"] == "min_call_rate"));
    assert!(excluded
        .iter()
        .any(|r| r["id"] == "1:300" && r["threshold"] == "min_minor_allele_freq"));
}

#[test]
fn config_file_sets_thresholds() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = write(dir.path(), "a.vcf", VCF);
    let cfg = write(
        dir.path(),
        "cfg.json",
        r#"{ "filter": { "min_call_rate": 0.0, "min_minor_allele_freq": 0.0, "max_sample_missing": 0.0 } }"#,
    );
    let out = run_ok(&["summary", "--config", str_of(&cfg), "--input", str_of(&vcf)]);
    assert_eq!(metrics(&out)["variants"], 4);

    // explicit flag overrides the file
    let out = run_ok(&[
        "summary",
        "--config",
        str_of(&cfg),
        "--min-call-rate",
        "0.9",
        "--input",
        str_of(&vcf),
    ]);
    assert_eq!(metrics(&out)["variants"], 3);
}

#[test]
fn freq_table_without_filter() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = write(dir.path(), "a.vcf", VCF);
    let out_path = dir.path().join("freq.tsv");
    run_ok(&["freq", "--no-filter", "--input", str_of(&vcf), "--out", str_of(&out_path)]);

    let rows = read_table(&fs::read_to_string(&out_path).unwrap());
    assert_eq!(rows.len(), 4);
    assert_eq!(rows[0]["variant_id"], "rs1");
    assert_eq!(rows[0]["ref_count"], "4");
    assert_eq!(rows[0]["alt_count"], "4");
    assert_eq!(rows[0]["alt_freq"], "0.5");
    assert_eq!(rows[3]["missing"], "1");
    assert_eq!(rows[3]["ref_count"], "3");
    assert_eq!(rows[2]["maf"], "0");
}

#[test]
fn hwe_flags_small_samples() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = write(dir.path(), "a.vcf", VCF);
    let rows = read_table(&run_ok(&["hwe", "--no-filter", "--input", str_of(&vcf)]));
    assert_eq!(rows.len(), 4);
    for row in &rows {
        assert_eq!(row["status"], "low_expected_count");
        assert_eq!(row["chi_square"], "NA");
        let p: f64 = row["exact_p_value"].parse().unwrap();
        assert!((0.0..=1.0).contains(&p));
    }
    assert_eq!(rows[2]["exact_p_value"], "1");
}

#[test]
fn ld_by_pair_and_window() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = write(dir.path(), "a.vcf", VCF);

    let rows = read_table(&run_ok(&[
        "ld",
        "--no-filter",
        "--input",
        str_of(&vcf),
        "--pair",
        "rs1,rs2",
    ]));
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0]["variant_a"], "rs1");
    assert_eq!(rows[0]["variant_b"], "rs2");
    assert_eq!(rows[0]["distance"], "100");
    assert_eq!(rows[0]["r2"], "1");
    assert_eq!(rows[0]["n_samples"], "4");

    let rows = read_table(&run_ok(&["ld", "--no-filter", "--input", str_of(&vcf), "--window", "1"]));
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[1]["variant_b"], "rs3");
    assert_eq!(rows[1]["r2"], "NA");

    let bad = snpkit(&["ld", "--no-filter", "--input", str_of(&vcf), "--pair", "rs1,rs99"]);
    assert!(!bad.status.success());
}

/// Two groups of six samples with opposite allele frequencies.
fn two_group_vcf() -> String {
    let mut text = String::from("##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT");
    for s in 0..12 {
        text.push_str(&format!("\tP{}", s));
    }
    text.push('\n');
    for v in 0..10 {
        text.push_str(&format!("1\t{}\tm{}\tA\tG\t.\tPASS\t.\tGT", 1000 * (v + 1), v));
        for s in 0..12 {
            let gt = match (s < 6, (s + v) % 4 == 0) {
                (_, true) => "0/1",
                (true, false) => "0/0",
                (false, false) => "1/1",
            };
            text.push('\t');
            text.push_str(gt);
        }
        text.push('\n');
    }
    text
}

#[test]
fn pca_writes_scores_and_json() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = write(dir.path(), "groups.vcf", &two_group_vcf());
    let json = dir.path().join("pca.json");
    let rows = read_table(&run_ok(&[
        "pca",
        "--input",
        str_of(&vcf),
        "--components",
        "3",
        "--json",
        str_of(&json),
    ]));
    assert_eq!(rows.len(), 12);
    assert_eq!(rows[0]["sample_id"], "P0");
    assert!(rows[0].contains_key("PC3"));
    let pc1: Vec<f64> = rows.iter().map(|r| r["PC1"].parse().unwrap()).collect();
    assert!(pc1[..6].iter().all(|&x| x * pc1[0] > 0.0));
    assert!(pc1[6..].iter().all(|&x| x * pc1[0] < 0.0));

    let value: serde_json::Value = serde_json::from_str(&fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(value["sample_ids"].as_array().unwrap().len(), 12);
    assert_eq!(value["explained_variance_ratio"].as_array().unwrap().len(), 3);
}

#[test]
fn clustering_is_reproducible() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = write(dir.path(), "groups.vcf", &two_group_vcf());
    let args = [
        "cluster",
        "--input",
        str_of(&vcf),
        "--method",
        "kmeans",
        "--k",
        "2",
        "--max-iterations",
        "100",
    ];
    let first = run_ok(&args);
    let second = run_ok(&args);
    assert_eq!(first, second);
    assert_eq!(read_table(&first).len(), 12);

    let rows = read_table(&run_ok(&[
        "cluster",
        "--input",
        str_of(&vcf),
        "--method",
        "hierarchical",
        "--linkage",
        "average",
        "--k",
        "2",
    ]));
    let labels: Vec<&str> = rows.iter().map(|r| r["cluster"].as_str()).collect();
    assert!(labels[..6].iter().all(|&l| l == "0"));
    assert!(labels[6..].iter().all(|&l| l == "1"));
}

#[test]
fn missing_input_fails_with_context() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.vcf");
    let out = snpkit(&["freq", "--input", str_of(&missing)]);
    assert!(!out.status.success());
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("loading genotype inputs"));
}
