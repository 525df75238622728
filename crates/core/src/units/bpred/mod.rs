//! Branch prediction unit.
//!
//! Direction predictors (bimodal, two-level, combining, and the static
//! taken/not-taken policies) behind one statically-dispatched wrapper,
//! together with the branch target buffer and the return address stack.
//! Perfect prediction has no predictor state: the dispatch stage patches
//! fetch with the computed next PC instead.
//!
//! The consumer contract is three calls: `lookup` at fetch (returning a
//! predicted PC, a direction cookie, and a RAS snapshot), `update` at
//! whichever stage the update policy selects, and `recover` after a
//! misprediction (restoring the RAS top).

/// Bimodal two-bit counter table.
pub mod bimod;
/// Branch target buffer.
pub mod btb;
/// Return address stack.
pub mod ras;
/// Two-level adaptive predictor.
pub mod twolev;

use crate::common::{Addr, INST_BYTES};
use crate::config::{BpredConfig, BpredKind};
use self::bimod::Bimod;
use self::btb::Btb;
use self::ras::Ras;
use self::twolev::TwoLev;

/// Direction-update cookie captured at lookup and replayed at update.
///
/// Carries the counter indices consulted for this branch plus each
/// component's predicted direction (the combining predictor's meta table
/// trains toward whichever component was right).
#[derive(Debug, Clone, Copy, Default)]
pub struct DirCookie {
    /// Bimodal counter index, if consulted.
    pub bimod_idx: Option<usize>,
    /// Two-level counter index, if consulted.
    pub twolev_idx: Option<usize>,
    /// Meta-chooser index, if consulted.
    pub meta_idx: Option<usize>,
    /// Bimodal component's predicted direction.
    pub bimod_taken: bool,
    /// Two-level component's predicted direction.
    pub twolev_taken: bool,
}

/// Result of a predictor lookup.
#[derive(Debug, Clone, Copy)]
pub struct Lookup {
    /// Predicted taken-target, or `None` to fall through.
    pub pred_pc: Option<Addr>,
    /// Direction cookie for the eventual update.
    pub cookie: DirCookie,
    /// Return-address-stack top before this instruction (recovery snapshot).
    pub ras_idx: usize,
}

/// Direction predictor variants (static dispatch).
enum Dir {
    NotTaken,
    Taken,
    Bimod(Bimod),
    TwoLev(TwoLev),
    Comb {
        bimod: Bimod,
        twolev: TwoLev,
        meta: Vec<u8>,
    },
}

/// The branch prediction unit: direction predictor + BTB + RAS.
pub struct Predictor {
    dir: Dir,
    btb: Btb,
    ras: Ras,
}

impl Predictor {
    /// Builds the predictor selected by the configuration. `Perfect` builds
    /// no direction state; the engine handles it at dispatch and never
    /// consults the tables.
    pub fn new(cfg: &BpredConfig) -> Self {
        let dir = match cfg.kind {
            BpredKind::NotTaken | BpredKind::Perfect => Dir::NotTaken,
            BpredKind::Taken => Dir::Taken,
            BpredKind::Bimod => Dir::Bimod(Bimod::new(cfg.bimod_size)),
            BpredKind::TwoLev => Dir::TwoLev(TwoLev::new(
                cfg.twolev_l1_size,
                cfg.twolev_l2_size,
                cfg.twolev_hist_bits,
                cfg.twolev_xor,
            )),
            BpredKind::Comb => Dir::Comb {
                bimod: Bimod::new(cfg.bimod_size),
                twolev: TwoLev::new(
                    cfg.twolev_l1_size,
                    cfg.twolev_l2_size,
                    cfg.twolev_hist_bits,
                    cfg.twolev_xor,
                ),
                meta: vec![1; cfg.comb_meta_size],
            },
        };
        Self {
            dir,
            btb: Btb::new(cfg.btb_sets, cfg.btb_assoc),
            ras: Ras::new(cfg.ras_size),
        }
    }

    /// Looks up the prediction for a control instruction at `pc`.
    pub fn lookup(&mut self, pc: Addr, is_call: bool, is_ret: bool, is_uncond: bool) -> Lookup {
        let ras_idx = self.ras.tos();

        if is_ret {
            let target = self.ras.pop();
            return Lookup {
                pred_pc: (target != 0).then_some(target),
                cookie: DirCookie::default(),
                ras_idx,
            };
        }
        if is_call {
            self.ras.push(pc.wrapping_add(INST_BYTES));
        }

        let (taken, cookie) = if is_uncond {
            (true, DirCookie::default())
        } else {
            self.direction(pc)
        };

        Lookup {
            pred_pc: if taken { self.btb.lookup(pc) } else { None },
            cookie,
            ras_idx,
        }
    }

    /// Consults the direction predictor for a conditional branch.
    fn direction(&self, pc: Addr) -> (bool, DirCookie) {
        let mut cookie = DirCookie::default();
        let taken = match &self.dir {
            Dir::NotTaken => false,
            Dir::Taken => true,
            Dir::Bimod(bimod) => {
                let idx = bimod.index(pc);
                cookie.bimod_idx = Some(idx);
                cookie.bimod_taken = bimod.taken(idx);
                cookie.bimod_taken
            }
            Dir::TwoLev(twolev) => {
                let idx = twolev.index(pc);
                cookie.twolev_idx = Some(idx);
                cookie.twolev_taken = twolev.taken(idx);
                cookie.twolev_taken
            }
            Dir::Comb {
                bimod,
                twolev,
                meta,
            } => {
                let bi = bimod.index(pc);
                let ti = twolev.index(pc);
                let mi = ((pc >> 3) as usize) & (meta.len() - 1);
                cookie.bimod_idx = Some(bi);
                cookie.twolev_idx = Some(ti);
                cookie.meta_idx = Some(mi);
                cookie.bimod_taken = bimod.taken(bi);
                cookie.twolev_taken = twolev.taken(ti);
                if meta[mi] >= 2 {
                    cookie.twolev_taken
                } else {
                    cookie.bimod_taken
                }
            }
        };
        (taken, cookie)
    }

    /// Trains the predictor with a resolved branch.
    pub fn update(&mut self, pc: Addr, target: Addr, taken: bool, cookie: &DirCookie) {
        // The meta chooser trains toward the component that was right when
        // the components disagreed.
        if let (Dir::Comb { meta, .. }, Some(mi)) = (&mut self.dir, cookie.meta_idx) {
            if cookie.bimod_taken != cookie.twolev_taken {
                let twolev_right = cookie.twolev_taken == taken;
                let c = &mut meta[mi];
                if twolev_right {
                    if *c < 3 {
                        *c += 1;
                    }
                } else if *c > 0 {
                    *c -= 1;
                }
            }
        }
        match &mut self.dir {
            Dir::Bimod(bimod) => {
                if let Some(idx) = cookie.bimod_idx {
                    bimod.update(idx, taken);
                }
            }
            Dir::TwoLev(twolev) => {
                if let Some(idx) = cookie.twolev_idx {
                    twolev.update(pc, idx, taken);
                }
            }
            Dir::Comb { bimod, twolev, .. } => {
                if let Some(idx) = cookie.bimod_idx {
                    bimod.update(idx, taken);
                }
                if let Some(idx) = cookie.twolev_idx {
                    twolev.update(pc, idx, taken);
                }
            }
            Dir::NotTaken | Dir::Taken => {}
        }
        if taken {
            self.btb.update(pc, target);
        }
    }

    /// Restores the return-address stack after a misprediction.
    pub fn recover(&mut self, _pc: Addr, ras_idx: usize) {
        self.ras.recover(ras_idx);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn predictor(kind: BpredKind) -> Predictor {
        let cfg = BpredConfig {
            kind,
            ..Default::default()
        };
        Predictor::new(&cfg)
    }

    #[test]
    fn test_nottaken_always_falls_through() {
        let mut p = predictor(BpredKind::NotTaken);
        let l = p.lookup(0x100, false, false, false);
        assert_eq!(l.pred_pc, None);
    }

    #[test]
    fn test_bimod_learns_taken_with_btb_target() {
        let mut p = predictor(BpredKind::Bimod);
        // Untrained: weakly not-taken.
        assert_eq!(p.lookup(0x100, false, false, false).pred_pc, None);
        for _ in 0..3 {
            let l = p.lookup(0x100, false, false, false);
            p.update(0x100, 0x200, true, &l.cookie);
        }
        assert_eq!(p.lookup(0x100, false, false, false).pred_pc, Some(0x200));
    }

    #[test]
    fn test_unconditional_uses_btb_without_counters() {
        let mut p = predictor(BpredKind::Bimod);
        let l = p.lookup(0x100, false, false, true);
        assert_eq!(l.pred_pc, None);
        p.update(0x100, 0x300, true, &l.cookie);
        let l = p.lookup(0x100, false, false, true);
        assert_eq!(l.pred_pc, Some(0x300));
        assert!(l.cookie.bimod_idx.is_none());
    }

    #[test]
    fn test_call_return_through_ras() {
        let mut p = predictor(BpredKind::Bimod);
        let call = p.lookup(0x100, true, false, true);
        assert_eq!(call.ras_idx, 0);
        let ret = p.lookup(0x500, false, true, false);
        assert_eq!(ret.pred_pc, Some(0x108));
    }

    #[test]
    fn test_ras_recovery_undoes_wrong_path() {
        let mut p = predictor(BpredKind::Bimod);
        let _ = p.lookup(0x100, true, false, true); // call, push 0x108
        let snap = p.lookup(0x200, false, false, false); // branch snapshot
        let _ = p.lookup(0x300, true, false, true); // wrong-path call
        p.recover(0x200, snap.ras_idx);
        let ret = p.lookup(0x400, false, true, false);
        assert_eq!(ret.pred_pc, Some(0x108));
    }

    #[test]
    fn test_comb_meta_tracks_better_component() {
        let mut p = predictor(BpredKind::Comb);
        // Strongly biased taken branch: both components converge; the
        // prediction must end up taken either way.
        for _ in 0..8 {
            let l = p.lookup(0x100, false, false, false);
            p.update(0x100, 0x180, true, &l.cookie);
        }
        assert_eq!(p.lookup(0x100, false, false, false).pred_pc, Some(0x180));
    }
}
