use crate::error::{InvalidArgument, Result};

/// Number of reference-allele copies carried by a diploid individual.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Genotype {
    HomAlt = 0,
    Het = 1,
    HomRef = 2,
}

impl Genotype {
    pub const ALL: [Genotype; 3] = [Genotype::HomAlt, Genotype::Het, Genotype::HomRef];

    pub fn ref_copies(self) -> u8 {
        self as u8
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

impl TryFrom<u8> for Genotype {
    type Error = InvalidArgument;

    fn try_from(g: u8) -> std::result::Result<Self, Self::Error> {
        match g {
            0 => Ok(Genotype::HomAlt),
            1 => Ok(Genotype::Het),
            2 => Ok(Genotype::HomRef),
            _ => Err(InvalidArgument::Genotype { g }),
        }
    }
}

/// `ref_reads` reference-allele reads out of `depth` reads covering the site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Observation {
    ref_reads: u64,
    depth: u64,
}

impl Observation {
    pub fn new(ref_reads: u64, depth: u64) -> Result<Self> {
        check_counts(ref_reads, depth)?;
        Ok(Self { ref_reads, depth })
    }

    pub fn ref_reads(&self) -> u64 {
        self.ref_reads
    }

    pub fn alt_reads(&self) -> u64 {
        self.depth - self.ref_reads
    }

    pub fn depth(&self) -> u64 {
        self.depth
    }
}

/// Read counts of one site across a sample of individuals. Order carries no meaning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    observations: Vec<Observation>,
}

impl Dataset {
    pub fn new(observations: Vec<Observation>) -> Self {
        Self { observations }
    }

    /// Every individual sequenced at the same `depth`.
    pub fn with_depth(depth: u64, ref_reads: &[u64]) -> Result<Self> {
        let observations = ref_reads
            .iter()
            .map(|&r| Observation::new(r, depth))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { observations })
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub(crate) fn ensure_not_empty(&self) -> Result<()> {
        if self.is_empty() {
            return Err(InvalidArgument::EmptyDataset.into());
        }
        Ok(())
    }
}

impl FromIterator<Observation> for Dataset {
    fn from_iter<I: IntoIterator<Item = Observation>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

pub(crate) fn check_counts(r: u64, n: u64) -> Result<()> {
    if n == 0 {
        return Err(InvalidArgument::Depth.into());
    }
    if r > n {
        return Err(InvalidArgument::ReadCount { r, n }.into());
    }
    Ok(())
}

pub(crate) fn check_error_rate(e: f64) -> Result<()> {
    // Written so that NaN fails too
    if !(e > 0.0 && e < 1.0) {
        return Err(InvalidArgument::ErrorRate { e }.into());
    }
    Ok(())
}

pub(crate) fn check_frequency(psi: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&psi) {
        return Err(InvalidArgument::Frequency { psi }.into());
    }
    Ok(())
}
