use snpkit_core::{GenotypeMatrix, KMeansConfig, Linkage, Variant, VariantKey};
use snpkit_structure::{cluster, hierarchical, kmeans, pca, DropReason};

/// Three populations fixed for different alleles at blocks of sites, plus an
/// invariant site at the end.
fn populations() -> GenotypeMatrix {
    let n_per = 5;
    let n_variants = 13;
    let mut rows = Vec::new();
    for pop in 0..3usize {
        for i in 0..n_per {
            let row: Vec<Option<u8>> = (0..n_variants)
                .map(|v| {
                    if v == n_variants - 1 {
                        Some(0)
                    } else if v / 4 == pop {
                        Some(if (i + v) % 5 == 0 { 1 } else { 2 })
                    } else if (i * 3 + v) % 7 == 0 {
                        None
                    } else {
                        Some(((i + v) % 3 == 0) as u8)
                    }
                })
                .collect();
            rows.push(row);
        }
    }
    let ids = (0..rows.len()).map(|i| format!("ind{}", i)).collect();
    let variants = (0..n_variants)
        .map(|v| Variant::new(VariantKey::new("3", 1000 + v as u64, "C", "T"), None))
        .collect();
    GenotypeMatrix::from_dosage_rows(ids, variants, &rows).unwrap()
}

#[test]
fn invariant_column_reported_before_pca() {
    let m = populations();
    let e = pca(&m, 2).unwrap();
    assert_eq!(e.dropped.len(), 1);
    assert_eq!(e.dropped[0].index, 12);
    assert_eq!(e.dropped[0].reason, DropReason::ZeroVariance);
    assert_eq!(e.sample_ids, m.sample_ids());
    assert!(e.explained_variance_ratio[0] >= e.explained_variance_ratio[1]);
}

#[test]
fn clustering_is_deterministic() {
    let e = pca(&populations(), 2).unwrap();
    let a = cluster(&e, 3, 100).unwrap();
    let b = cluster(&e, 3, 100).unwrap();
    assert_eq!(a.labels, b.labels);
    assert_eq!(a.iterations, b.iterations);
    assert_eq!(a.converged, b.converged);
    assert_eq!(a.labels.len(), 15);
    assert_eq!(a.cluster_sizes().iter().sum::<usize>(), 15);

    let c = kmeans(&e, &KMeansConfig { k: 3, max_iterations: 100, seed: 42 }).unwrap();
    assert_eq!(a, c);
}

#[test]
fn ward_cut_recovers_populations() {
    let e = pca(&populations(), 2).unwrap();
    let hc = hierarchical(&e, Linkage::Ward).unwrap().cut(3).unwrap();
    let labels = &hc.labels;
    for pop in 0..3 {
        let first = labels[pop * 5];
        assert!(labels[pop * 5..pop * 5 + 5].iter().all(|&l| l == first));
    }
    assert_eq!(hc.cluster_sizes(), vec![5, 5, 5]);
    assert_eq!(hc.labels[0], 0);
    assert_eq!(hc.labels[5], 1);
    assert_eq!(hc.labels[10], 2);
}
