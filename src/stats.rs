//! Assembly contiguity statistics for the before/after report.

/// One Nx point: the length such that contigs at least this long cover x%
/// of the assembly, and how many contigs that takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NxPoint {
    pub x: u32,
    pub length: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Default)]
pub struct AssemblyStats {
    pub total_bases: u64,
    pub num_contigs: usize,
    /// N50 through N100 in steps of 10.
    pub nx: Vec<NxPoint>,
}

impl AssemblyStats {
    pub fn from_lengths(lengths: &[u32]) -> Self {
        let mut sorted: Vec<u32> = lengths.to_vec();
        sorted.sort_unstable_by(|a, b| b.cmp(a));
        let total_bases: u64 = sorted.iter().map(|&l| l as u64).sum();

        let mut nx = Vec::new();
        let mut cumulative = 0u64;
        let mut x = 50u32;
        for (i, &length) in sorted.iter().enumerate() {
            cumulative += length as u64;
            while x <= 100 && cumulative as f64 >= total_bases as f64 * (x as f64 / 100.0) {
                nx.push(NxPoint {
                    x,
                    length,
                    count: i + 1,
                });
                x += 10;
            }
        }

        AssemblyStats {
            total_bases,
            num_contigs: sorted.len(),
            nx,
        }
    }

    pub fn n50(&self) -> u32 {
        self.nx
            .iter()
            .find(|p| p.x == 50)
            .map(|p| p.length)
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_assembly() {
        let stats = AssemblyStats::from_lengths(&[]);
        assert_eq!(stats.total_bases, 0);
        assert_eq!(stats.num_contigs, 0);
        assert_eq!(stats.n50(), 0);
    }

    #[test]
    fn n50_of_simple_assembly() {
        // Total 1000; cumulative 500 reached by the 400+300 prefix at 300.
        let stats = AssemblyStats::from_lengths(&[100, 400, 300, 200]);
        assert_eq!(stats.total_bases, 1000);
        assert_eq!(stats.n50(), 300);

        let n100 = stats.nx.iter().find(|p| p.x == 100).unwrap();
        assert_eq!(n100.length, 100);
        assert_eq!(n100.count, 4);
    }

    #[test]
    fn single_contig_dominates_every_nx() {
        let stats = AssemblyStats::from_lengths(&[5000]);
        assert_eq!(stats.nx.len(), 6);
        assert!(stats.nx.iter().all(|p| p.length == 5000 && p.count == 1));
    }
}
