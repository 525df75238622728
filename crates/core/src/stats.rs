//! Simulation statistics collection and reporting.
//!
//! Tracks the core performance counters:
//! 1. **Instructions:** committed vs. total (wrong-path included), plus
//!    branch/load/store/reference breakdowns.
//! 2. **Forks:** total, speculative, and non-speculative sibling forks.
//! 3. **Occupancy:** cumulative fetch-queue/RUU/LSQ occupancy and
//!    full-cycle counts.
//! 4. **Derived:** IPC, CPI, and average dispatch-to-commit slip.

/// Counter set for one simulation.
#[derive(Clone, Debug, Default)]
pub struct SimStats {
    /// Simulation cycles elapsed.
    pub cycles: u64,
    /// Committed (non-speculative) instructions.
    pub num_insn: u64,
    /// All dispatched instructions, wrong paths included.
    pub total_insn: u64,
    /// Committed memory references.
    pub num_refs: u64,
    /// All dispatched memory references.
    pub total_refs: u64,
    /// Committed loads.
    pub num_loads: u64,
    /// All dispatched loads.
    pub total_loads: u64,
    /// Committed branches.
    pub num_branches: u64,
    /// All dispatched branches.
    pub total_branches: u64,
    /// Successful sibling forks.
    pub num_forks: u64,
    /// Forks taken while the parent was already speculative.
    pub num_spec_forks: u64,
    /// Forks taken from a non-speculative parent.
    pub num_nonspec_forks: u64,
    /// Cumulative dispatch-to-commit slip over committed instructions.
    pub slip: u64,
    /// Non-speculative accesses to invalid addresses observed at issue.
    pub invalid_addrs: u64,
    /// Cumulative fetch-queue occupancy.
    pub ifq_occupancy: u64,
    /// Cycles the fetch queue was full.
    pub ifq_full: u64,
    /// Cumulative RUU occupancy.
    pub ruu_occupancy: u64,
    /// Cycles the RUU was full.
    pub ruu_full: u64,
    /// Cumulative LSQ occupancy.
    pub lsq_occupancy: u64,
    /// Cycles the LSQ was full.
    pub lsq_full: u64,
}

impl SimStats {
    /// Instructions per cycle over the whole run.
    pub fn ipc(&self) -> f64 {
        self.num_insn as f64 / self.cycles.max(1) as f64
    }

    /// Cycles per instruction over the whole run.
    pub fn cpi(&self) -> f64 {
        self.cycles as f64 / self.num_insn.max(1) as f64
    }

    /// Average dispatch-to-commit latency of committed instructions.
    pub fn avg_slip(&self) -> f64 {
        self.slip as f64 / self.num_insn.max(1) as f64
    }

    /// Prints the full statistics report to stdout.
    pub fn print(&self) {
        let cyc = self.cycles.max(1);
        println!("\n==========================================================");
        println!("SIMULATION STATISTICS");
        println!("==========================================================");
        println!("sim_cycle                {}", self.cycles);
        println!("sim_num_insn             {}", self.num_insn);
        println!("sim_total_insn           {}", self.total_insn);
        println!("sim_IPC                  {:.4}", self.ipc());
        println!("sim_CPI                  {:.4}", self.cpi());
        println!("sim_slip                 {:.4}", self.avg_slip());
        println!("----------------------------------------------------------");
        println!("sim_num_branches         {}", self.num_branches);
        println!("sim_total_branches       {}", self.total_branches);
        println!("sim_num_loads            {}", self.num_loads);
        println!("sim_total_loads          {}", self.total_loads);
        println!("sim_num_refs             {}", self.num_refs);
        println!("sim_total_refs           {}", self.total_refs);
        println!("sim_invalid_addrs        {}", self.invalid_addrs);
        println!("----------------------------------------------------------");
        println!("sim_num_forks            {}", self.num_forks);
        println!("sim_num_spec_forks       {}", self.num_spec_forks);
        println!("sim_num_nonspec_forks    {}", self.num_nonspec_forks);
        println!("----------------------------------------------------------");
        let occ = |name: &str, total: u64, full: u64| {
            println!(
                "{:<14} avg: {:<8.2} full: {} ({:.2}%)",
                name,
                total as f64 / cyc as f64,
                full,
                full as f64 / cyc as f64 * 100.0
            );
        };
        occ("ifq_occupancy", self.ifq_occupancy, self.ifq_full);
        occ("ruu_occupancy", self.ruu_occupancy, self.ruu_full);
        occ("lsq_occupancy", self.lsq_occupancy, self.lsq_full);
        println!("==========================================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_derived_metrics() {
        let stats = SimStats {
            cycles: 200,
            num_insn: 100,
            slip: 800,
            ..Default::default()
        };
        assert!((stats.ipc() - 0.5).abs() < 1e-9);
        assert!((stats.cpi() - 2.0).abs() < 1e-9);
        assert!((stats.avg_slip() - 8.0).abs() < 1e-9);
    }

    #[test]
    fn test_fork_conservation() {
        let stats = SimStats {
            num_forks: 10,
            num_spec_forks: 4,
            num_nonspec_forks: 6,
            ..Default::default()
        };
        assert_eq!(
            stats.num_forks,
            stats.num_spec_forks + stats.num_nonspec_forks
        );
    }
}
