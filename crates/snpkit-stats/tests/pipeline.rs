use std::fs;
use std::path::PathBuf;

use approx::assert_relative_eq;
use snpkit_core::{FilterConfig, Genotype};
use snpkit_io::load;
use snpkit_stats::{allele_frequencies, filter, hwe_test, ld, HweStatus, Threshold};

fn write_vcf(dir: &tempfile::TempDir, body: &str) -> PathBuf {
    let path = dir.path().join("synthetic.vcf");
    let mut text = String::from(
        "##fileformat=VCFv4.2\n#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT\tS1\tS2\tS3\n",
    );
    text.push_str(body);
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn three_sample_frequency_scenario() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = write_vcf(
        &dir,
        "1\t100\tA\tC\tT\t.\t.\t.\tGT\t0/0\t0/1\t1/1\n1\t200\tB\tG\tA\t.\t.\t.\tGT\t0/0\t0/0\t0/1\n",
    );
    let (m, _) = load(&[&vcf]).unwrap();
    let freqs = allele_frequencies(&m);
    assert_relative_eq!(freqs[0].alt_freq, 0.5, epsilon = 1e-9);
    assert_relative_eq!(freqs[1].alt_freq, 1.0 / 6.0, epsilon = 1e-9);
}

#[test]
fn vcf_round_trip_matches_hand_counts() {
    // deterministic pseudo-random calls, including missing ones
    let tokens = ["0/0", "0/1", "1|1", "./.", "1|0"];
    let mut body = String::new();
    let mut expected = Vec::new();
    for v in 0..40usize {
        let calls: Vec<&str> = (0..3).map(|s| tokens[(v * 7 + s * 3 + v / 5) % tokens.len()]).collect();
        let (alt, called) = calls.iter().fold((0usize, 0usize), |(alt, called), t| match *t {
            "0/0" => (alt, called + 1),
            "0/1" | "1|0" => (alt + 1, called + 1),
            "1|1" => (alt + 2, called + 1),
            _ => (alt, called),
        });
        expected.push(if called == 0 { f64::NAN } else { alt as f64 / (2 * called) as f64 });
        body.push_str(&format!(
            "2\t{}\t.\tA\tG\t.\t.\t.\tGT\t{}\n",
            1000 + v,
            calls.join("\t")
        ));
    }
    let dir = tempfile::tempdir().unwrap();
    let vcf = write_vcf(&dir, &body);
    let (m, report) = load(&[&vcf]).unwrap();
    assert_eq!(report.rejected_rows(), 0);

    for (rec, want) in allele_frequencies(&m).iter().zip(&expected) {
        if want.is_nan() {
            assert!(rec.alt_freq.is_nan());
        } else {
            assert!((0.0..=1.0).contains(&rec.alt_freq));
            assert_relative_eq!(rec.alt_freq, *want, epsilon = 1e-9);
        }
    }
}

#[test]
fn filter_then_statistics() {
    let dir = tempfile::tempdir().unwrap();
    let vcf = write_vcf(
        &dir,
        "1\t100\t.\tC\tT\t.\t.\t.\tGT\t0/0\t0/1\t1/1\n\
         1\t200\t.\tG\tA\t.\t.\t.\tGT\t0/0\t./.\t0/1\n\
         1\t300\t.\tG\tA\t.\t.\t.\tGT\t0/0\t0/0\t0/0\n",
    );
    let (m, _) = load(&[&vcf]).unwrap();
    let (filtered, report) = filter(&m, &FilterConfig::default()).unwrap();

    assert_eq!(filtered.n_variants(), 1);
    assert_eq!(report.kept_variants, vec![0]);
    let thresholds: Vec<Threshold> = report
        .excluded_variants
        .iter()
        .map(|e| e.violations[0].threshold)
        .collect();
    assert_eq!(thresholds, vec![Threshold::CallRate, Threshold::MinorAlleleFreq]);
    // input untouched
    assert_eq!(m.n_variants(), 3);
    assert_eq!(m.get(1, 1).unwrap(), Genotype::Missing);

    let hwe = hwe_test(&filtered, 0).unwrap();
    assert_eq!(hwe.status, HweStatus::LowExpectedCount);
    assert!(hwe.exact_p_value > 0.0);

    let self_ld = ld(&filtered, 0, 0).unwrap();
    assert_relative_eq!(self_ld.r2, 1.0);
}
