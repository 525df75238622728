//! Functional-unit resource pool.
//!
//! A static table of unit instances, each supporting a set of operation
//! classes with an (operation latency, issue latency) pair. A unit carries a
//! `busy` countdown: it is allocatable iff the countdown is zero, and
//! acquisition reserves it for the operation's issue latency. The release
//! phase steps every countdown once per cycle.

use crate::config::ResourceConfig;
use crate::isa::FuClass;

/// Latency pair for one operation class on a unit.
#[derive(Debug, Clone, Copy)]
pub struct OpTiming {
    /// Operation class served.
    pub class: FuClass,
    /// Cycles until the result is available.
    pub oplat: u64,
    /// Cycles the unit stays reserved after issue.
    pub issuelat: u64,
}

/// One functional-unit instance.
struct FuUnit {
    name: &'static str,
    busy: u64,
    ops: &'static [OpTiming],
}

/// Timing tables per resource kind.
mod timing {
    use super::OpTiming;
    use crate::isa::FuClass;

    pub const IALU: &[OpTiming] = &[OpTiming {
        class: FuClass::IntAlu,
        oplat: 1,
        issuelat: 1,
    }];

    pub const IMULT: &[OpTiming] = &[
        OpTiming {
            class: FuClass::IntMult,
            oplat: 3,
            issuelat: 1,
        },
        OpTiming {
            class: FuClass::IntDiv,
            oplat: 20,
            issuelat: 19,
        },
    ];

    pub const MEMPORT: &[OpTiming] = &[
        OpTiming {
            class: FuClass::RdPort,
            oplat: 1,
            issuelat: 1,
        },
        OpTiming {
            class: FuClass::WrPort,
            oplat: 1,
            issuelat: 1,
        },
    ];

    pub const FPALU: &[OpTiming] = &[
        OpTiming {
            class: FuClass::FpAdd,
            oplat: 2,
            issuelat: 1,
        },
        OpTiming {
            class: FuClass::FpCvt,
            oplat: 2,
            issuelat: 1,
        },
    ];

    pub const FPMULT: &[OpTiming] = &[
        OpTiming {
            class: FuClass::FpMult,
            oplat: 4,
            issuelat: 1,
        },
        OpTiming {
            class: FuClass::FpDiv,
            oplat: 12,
            issuelat: 12,
        },
    ];
}

/// The pool of all functional units.
pub struct FuPool {
    units: Vec<FuUnit>,
}

impl FuPool {
    /// Builds the pool from configured unit counts.
    pub fn new(res: &ResourceConfig) -> Self {
        let mut units = Vec::new();
        let mut add = |name: &'static str, count: usize, ops: &'static [OpTiming]| {
            for _ in 0..count {
                units.push(FuUnit {
                    name,
                    busy: 0,
                    ops,
                });
            }
        };
        add("integer-ALU", res.ialu, timing::IALU);
        add("integer-MULT/DIV", res.imult, timing::IMULT);
        add("memory-port", res.memport, timing::MEMPORT);
        add("FP-adder", res.fpalu, timing::FPALU);
        add("FP-MULT/DIV", res.fpmult, timing::FPMULT);
        Self { units }
    }

    /// Acquires a free unit for `class`, reserving it for the class's issue
    /// latency. Returns the timing pair, or `None` when every capable unit
    /// is busy.
    pub fn acquire(&mut self, class: FuClass) -> Option<OpTiming> {
        for unit in &mut self.units {
            if unit.busy != 0 {
                continue;
            }
            if let Some(t) = unit.ops.iter().find(|t| t.class == class) {
                assert!(unit.busy == 0, "functional unit {} already in use", unit.name);
                unit.busy = t.issuelat;
                return Some(*t);
            }
        }
        None
    }

    /// Steps every busy countdown by one; called once per cycle in the
    /// release phase.
    pub fn release_tick(&mut self) {
        for unit in &mut self.units {
            if unit.busy > 0 {
                unit.busy -= 1;
            }
        }
    }

    /// Number of currently busy units (observability).
    pub fn busy_count(&self) -> usize {
        self.units.iter().filter(|u| u.busy > 0).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(ialu: usize, imult: usize) -> FuPool {
        FuPool::new(&ResourceConfig {
            ialu,
            imult,
            memport: 1,
            fpalu: 1,
            fpmult: 1,
        })
    }

    #[test]
    fn test_acquire_exhausts_and_releases() {
        let mut p = pool(2, 1);
        assert!(p.acquire(FuClass::IntAlu).is_some());
        assert!(p.acquire(FuClass::IntAlu).is_some());
        assert!(p.acquire(FuClass::IntAlu).is_none());

        p.release_tick();
        assert!(p.acquire(FuClass::IntAlu).is_some());
    }

    #[test]
    fn test_div_holds_unit_longer() {
        let mut p = pool(1, 1);
        let t = p.acquire(FuClass::IntDiv).unwrap();
        assert_eq!(t.oplat, 20);
        // Unit remains reserved for issuelat cycles.
        for _ in 0..18 {
            p.release_tick();
            assert!(p.acquire(FuClass::IntMult).is_none());
        }
        p.release_tick();
        assert!(p.acquire(FuClass::IntMult).is_some());
    }

    #[test]
    fn test_classes_partitioned() {
        let mut p = pool(1, 1);
        assert!(p.acquire(FuClass::RdPort).is_some());
        // The single memory port also serves writes, so it is now busy.
        assert!(p.acquire(FuClass::WrPort).is_none());
        // Unrelated classes are unaffected.
        assert!(p.acquire(FuClass::FpAdd).is_some());
    }
}
