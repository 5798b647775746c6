//! Biallelic genotype calls and their token encodings.

use std::fmt;

/// One diploid biallelic call, stored as a small integer code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
#[repr(u8)]
pub enum Genotype {
    HomRef = 0,
    Het = 1,
    HomAlt = 2,
    #[default]
    Missing = 3,
}

impl Genotype {
    /// Alternate-allele dosage (0, 1, 2), `None` for a missing call.
    #[inline]
    pub fn dosage(self) -> Option<u8> {
        match self {
            Genotype::HomRef => Some(0),
            Genotype::Het => Some(1),
            Genotype::HomAlt => Some(2),
            Genotype::Missing => None,
        }
    }

    #[inline]
    pub fn is_missing(self) -> bool {
        self == Genotype::Missing
    }

    #[inline]
    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn from_dosage(dosage: u8) -> Option<Self> {
        match dosage {
            0 => Some(Genotype::HomRef),
            1 => Some(Genotype::Het),
            2 => Some(Genotype::HomAlt),
            _ => None,
        }
    }

    /// Parse a VCF `GT` value (`0/1`, `1|1`, `./.`, haploid `0`).
    ///
    /// Returns `None` for anything this biallelic engine cannot represent,
    /// including allele indices above 1 and polyploid calls.
    pub fn from_vcf_gt(token: &str) -> Option<Self> {
        let token = token.trim();
        if token.is_empty() {
            return None;
        }
        if token == "." {
            return Some(Genotype::Missing);
        }
        let mut alleles = token.split(['/', '|']);
        let first = alleles.next()?;
        let second = alleles.next();
        if alleles.next().is_some() {
            return None;
        }
        let a = parse_allele(first)?;
        match second {
            None => Some(match a {
                None => Genotype::Missing,
                Some(0) => Genotype::HomRef,
                Some(_) => Genotype::HomAlt,
            }),
            Some(second) => {
                let b = parse_allele(second)?;
                Some(match (a, b) {
                    (Some(x), Some(y)) => match x + y {
                        0 => Genotype::HomRef,
                        1 => Genotype::Het,
                        _ => Genotype::HomAlt,
                    },
                    // half-missing calls such as "./1" carry no usable dosage
                    _ => Genotype::Missing,
                })
            }
        }
    }

    /// Parse an explicit additive code: `0`, `1`, `2`, or `NA`/`.`/empty for missing.
    pub fn from_additive_token(token: &str) -> Option<Self> {
        match token.trim() {
            "0" => Some(Genotype::HomRef),
            "1" => Some(Genotype::Het),
            "2" => Some(Genotype::HomAlt),
            "" | "." => Some(Genotype::Missing),
            t if t.eq_ignore_ascii_case("na") => Some(Genotype::Missing),
            _ => None,
        }
    }
}

/// `Some(None)` = missing allele, `Some(Some(i))` = allele index 0/1, `None` = bad token.
fn parse_allele(s: &str) -> Option<Option<u8>> {
    match s {
        "." => Some(None),
        "0" => Some(Some(0)),
        "1" => Some(Some(1)),
        _ => None,
    }
}

impl fmt::Display for Genotype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.dosage() {
            Some(d) => write!(f, "{}", d),
            None => f.write_str("NA"),
        }
    }
}

/// Tally of calls at one variant (or for one sample).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GenotypeCounts {
    pub hom_ref: usize,
    pub het: usize,
    pub hom_alt: usize,
    pub missing: usize,
}

impl GenotypeCounts {
    pub fn from_calls<'a, I>(calls: I) -> Self
    where
        I: IntoIterator<Item = &'a Genotype>,
    {
        let mut counts = Self::default();
        for g in calls {
            counts.add(*g);
        }
        counts
    }

    #[inline]
    pub fn add(&mut self, g: Genotype) {
        match g {
            Genotype::HomRef => self.hom_ref += 1,
            Genotype::Het => self.het += 1,
            Genotype::HomAlt => self.hom_alt += 1,
            Genotype::Missing => self.missing += 1,
        }
    }

    /// Number of non-missing calls.
    pub fn called(&self) -> usize {
        self.hom_ref + self.het + self.hom_alt
    }

    pub fn total(&self) -> usize {
        self.called() + self.missing
    }

    pub fn ref_allele_count(&self) -> usize {
        2 * self.hom_ref + self.het
    }

    pub fn alt_allele_count(&self) -> usize {
        self.het + 2 * self.hom_alt
    }

    /// Fraction of non-missing calls; NaN when there are no calls at all.
    pub fn call_rate(&self) -> f64 {
        let total = self.total();
        if total == 0 {
            f64::NAN
        } else {
            self.called() as f64 / total as f64
        }
    }

    /// Alternate allele frequency; NaN when every call is missing.
    pub fn alt_freq(&self) -> f64 {
        let called = self.called();
        if called == 0 {
            f64::NAN
        } else {
            self.alt_allele_count() as f64 / (2 * called) as f64
        }
    }
}
