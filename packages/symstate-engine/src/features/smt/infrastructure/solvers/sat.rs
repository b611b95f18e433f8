//! CDCL SAT solver
//!
//! Two watched literals, first-UIP clause learning, VSIDS-style activities
//! with phase saving, and Luby restarts. Assumptions are decided first, one
//! per decision level; when one of them is refuted the solver reports the
//! subset of assumptions that caused it.

use std::collections::BinaryHeap;
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Var(pub u32);

/// `var * 2 + negated`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Lit(u32);

impl Lit {
    pub fn new(var: Var, negated: bool) -> Self {
        Lit(var.0 * 2 + negated as u32)
    }

    pub fn positive(var: Var) -> Self {
        Self::new(var, false)
    }

    pub fn var(self) -> Var {
        Var(self.0 / 2)
    }

    pub fn is_negated(self) -> bool {
        self.0 & 1 == 1
    }

    fn code(self) -> usize {
        self.0 as usize
    }
}

impl std::ops::Not for Lit {
    type Output = Lit;

    fn not(self) -> Lit {
        Lit(self.0 ^ 1)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SatOutcome {
    Sat,
    /// Failed assumptions; empty when the clauses alone are unsatisfiable
    Unsat(Vec<Lit>),
    Unknown(String),
}

/// Resource limits of one `solve` call
#[derive(Debug, Clone, Copy, Default)]
pub struct Limits {
    /// Conflicts allowed (0 = unlimited)
    pub conflicts: u64,
    pub deadline: Option<Instant>,
}

#[derive(Debug, Clone)]
struct Clause {
    lits: Vec<Lit>,
}

const RESTART_BASE: u64 = 100;
const ACTIVITY_DECAY: f64 = 0.95;
const RESCALE_LIMIT: f64 = 1e100;

enum SearchStatus {
    Done(SatOutcome),
    Restart,
}

#[derive(Debug, Default)]
pub struct SatSolver {
    clauses: Vec<Clause>,
    watches: Vec<Vec<usize>>,
    assigns: Vec<Option<bool>>,
    level: Vec<u32>,
    reason: Vec<Option<usize>>,
    phase: Vec<bool>,
    activity: Vec<f64>,
    seen: Vec<bool>,
    heap: BinaryHeap<(u64, u32)>,
    trail: Vec<Lit>,
    trail_lim: Vec<usize>,
    qhead: usize,
    var_inc: f64,
    ok: bool,
    conflicts: u64,
}

fn lit_value(assigns: &[Option<bool>], lit: Lit) -> Option<bool> {
    assigns[lit.var().0 as usize].map(|v| v != lit.is_negated())
}

fn luby(mut x: u64) -> u64 {
    // size of the smallest complete subsequence containing x, and its order
    let (mut size, mut seq) = (1u64, 0u32);
    while size < x + 1 {
        seq += 1;
        size = 2 * size + 1;
    }
    while size - 1 != x {
        size = (size - 1) >> 1;
        seq -= 1;
        x %= size;
    }
    1u64 << seq
}

impl SatSolver {
    pub fn new() -> Self {
        Self {
            var_inc: 1.0,
            ok: true,
            ..Self::default()
        }
    }

    pub fn num_vars(&self) -> usize {
        self.assigns.len()
    }

    pub fn num_clauses(&self) -> usize {
        self.clauses.len()
    }

    pub fn conflicts(&self) -> u64 {
        self.conflicts
    }

    pub fn new_var(&mut self) -> Var {
        let v = Var(self.assigns.len() as u32);
        self.assigns.push(None);
        self.level.push(0);
        self.reason.push(None);
        self.phase.push(true);
        self.activity.push(0.0);
        self.seen.push(false);
        self.watches.push(Vec::new());
        self.watches.push(Vec::new());
        self.heap.push((0f64.to_bits(), v.0));
        v
    }

    pub fn value(&self, lit: Lit) -> Option<bool> {
        lit_value(&self.assigns, lit)
    }

    /// Value of `var` in the last model (unassigned reads as false)
    pub fn model_value(&self, var: Var) -> bool {
        self.assigns[var.0 as usize].unwrap_or(false)
    }

    fn decision_level(&self) -> usize {
        self.trail_lim.len()
    }

    /// Add a clause at decision level 0; returns false once the clause set is
    /// known to be unsatisfiable
    pub fn add_clause(&mut self, lits: &[Lit]) -> bool {
        if !self.ok {
            return false;
        }
        self.cancel_until(0);
        let mut clause: Vec<Lit> = Vec::with_capacity(lits.len());
        for &lit in lits {
            match self.value(lit) {
                Some(true) => return true,
                Some(false) => continue,
                None => {}
            }
            if clause.contains(&!lit) {
                return true;
            }
            if !clause.contains(&lit) {
                clause.push(lit);
            }
        }
        match clause.len() {
            0 => {
                self.ok = false;
                false
            }
            1 => {
                self.enqueue(clause[0], None);
                if self.propagate().is_some() {
                    self.ok = false;
                }
                self.ok
            }
            _ => {
                self.attach(clause);
                true
            }
        }
    }

    fn attach(&mut self, lits: Vec<Lit>) -> usize {
        let cr = self.clauses.len();
        self.watches[lits[0].code()].push(cr);
        self.watches[lits[1].code()].push(cr);
        self.clauses.push(Clause { lits });
        cr
    }

    fn enqueue(&mut self, lit: Lit, reason: Option<usize>) {
        let v = lit.var().0 as usize;
        self.assigns[v] = Some(!lit.is_negated());
        self.level[v] = self.decision_level() as u32;
        self.reason[v] = reason;
        self.trail.push(lit);
    }

    fn propagate(&mut self) -> Option<usize> {
        while self.qhead < self.trail.len() {
            let p = self.trail[self.qhead];
            self.qhead += 1;
            let false_lit = !p;
            let watching = std::mem::take(&mut self.watches[false_lit.code()]);
            let mut keep: Vec<usize> = Vec::with_capacity(watching.len());
            let mut conflict = None;

            for (i, &cr) in watching.iter().enumerate() {
                if conflict.is_some() {
                    keep.extend_from_slice(&watching[i..]);
                    break;
                }
                let lits = &mut self.clauses[cr].lits;
                if lits[0] == false_lit {
                    lits.swap(0, 1);
                }
                if lit_value(&self.assigns, lits[0]) == Some(true) {
                    keep.push(cr);
                    continue;
                }
                let mut moved = false;
                for k in 2..lits.len() {
                    if lit_value(&self.assigns, lits[k]) != Some(false) {
                        lits.swap(1, k);
                        self.watches[lits[1].code()].push(cr);
                        moved = true;
                        break;
                    }
                }
                if moved {
                    continue;
                }
                keep.push(cr);
                let first = lits[0];
                if lit_value(&self.assigns, first) == Some(false) {
                    conflict = Some(cr);
                } else {
                    self.enqueue(first, Some(cr));
                }
            }

            self.watches[false_lit.code()] = keep;
            if conflict.is_some() {
                self.qhead = self.trail.len();
                return conflict;
            }
        }
        None
    }

    fn bump(&mut self, var: Var) {
        let v = var.0 as usize;
        self.activity[v] += self.var_inc;
        if self.activity[v] > RESCALE_LIMIT {
            for a in self.activity.iter_mut() {
                *a *= 1e-100;
            }
            self.var_inc *= 1e-100;
            self.heap = self
                .activity
                .iter()
                .enumerate()
                .filter(|(i, _)| self.assigns[*i].is_none())
                .map(|(i, a)| (a.to_bits(), i as u32))
                .collect();
        }
        if self.assigns[v].is_none() {
            self.heap.push((self.activity[v].to_bits(), var.0));
        }
    }

    fn analyze(&mut self, mut confl: usize) -> (Vec<Lit>, usize) {
        let mut learnt: Vec<Lit> = vec![Lit(0)];
        let mut path = 0usize;
        let mut p: Option<Lit> = None;
        let mut index = self.trail.len();
        let current = self.decision_level() as u32;

        loop {
            let start = if p.is_some() { 1 } else { 0 };
            let lits = self.clauses[confl].lits.clone();
            for &q in &lits[start..] {
                let v = q.var();
                let vi = v.0 as usize;
                if !self.seen[vi] && self.level[vi] > 0 {
                    self.bump(v);
                    self.seen[vi] = true;
                    if self.level[vi] >= current {
                        path += 1;
                    } else {
                        learnt.push(q);
                    }
                }
            }
            loop {
                index -= 1;
                if self.seen[self.trail[index].var().0 as usize] {
                    break;
                }
            }
            let lit = self.trail[index];
            let vi = lit.var().0 as usize;
            self.seen[vi] = false;
            path -= 1;
            p = Some(lit);
            if path == 0 {
                break;
            }
            // only decisions lack a reason, and the UIP is reached before one
            match self.reason[vi] {
                Some(r) => confl = r,
                None => break,
            }
        }
        if let Some(uip) = p {
            learnt[0] = !uip;
        }

        let mut backtrack = 0usize;
        if learnt.len() > 1 {
            let mut max_i = 1;
            for i in 2..learnt.len() {
                if self.level[learnt[i].var().0 as usize] > self.level[learnt[max_i].var().0 as usize]
                {
                    max_i = i;
                }
            }
            learnt.swap(1, max_i);
            backtrack = self.level[learnt[1].var().0 as usize] as usize;
        }
        for lit in &learnt {
            self.seen[lit.var().0 as usize] = false;
        }
        (learnt, backtrack)
    }

    /// Assumptions responsible for `failed` being false
    fn analyze_final(&mut self, failed: Lit) -> Vec<Lit> {
        let mut core = vec![failed];
        if self.decision_level() == 0 {
            return core;
        }
        self.seen[failed.var().0 as usize] = true;
        let start = self.trail_lim[0];
        for i in (start..self.trail.len()).rev() {
            let lit = self.trail[i];
            let vi = lit.var().0 as usize;
            if !self.seen[vi] {
                continue;
            }
            match self.reason[vi] {
                None => core.push(lit),
                Some(cr) => {
                    for &q in &self.clauses[cr].lits[1..] {
                        let qi = q.var().0 as usize;
                        if self.level[qi] > 0 {
                            self.seen[qi] = true;
                        }
                    }
                }
            }
            self.seen[vi] = false;
        }
        self.seen[failed.var().0 as usize] = false;
        core
    }

    fn cancel_until(&mut self, level: usize) {
        if self.decision_level() <= level {
            return;
        }
        let keep = self.trail_lim[level];
        for i in (keep..self.trail.len()).rev() {
            let lit = self.trail[i];
            let v = lit.var().0 as usize;
            self.phase[v] = !lit.is_negated();
            self.assigns[v] = None;
            self.reason[v] = None;
            self.heap.push((self.activity[v].to_bits(), v as u32));
        }
        self.trail.truncate(keep);
        self.trail_lim.truncate(level);
        self.qhead = keep;
    }

    fn pick_branch(&mut self) -> Option<Lit> {
        while let Some((_, v)) = self.heap.pop() {
            if self.assigns[v as usize].is_none() {
                let var = Var(v);
                return Some(Lit::new(var, !self.phase[v as usize]));
            }
        }
        // the heap may have lost entries on rescaling
        (0..self.assigns.len())
            .find(|v| self.assigns[*v].is_none())
            .map(|v| Lit::new(Var(v as u32), !self.phase[v]))
    }

    fn search(&mut self, budget: u64, assumptions: &[Lit], limits: &Limits, start: u64) -> SearchStatus {
        let mut local = 0u64;
        loop {
            if let Some(confl) = self.propagate() {
                self.conflicts += 1;
                local += 1;
                if self.decision_level() == 0 {
                    self.ok = false;
                    return SearchStatus::Done(SatOutcome::Unsat(Vec::new()));
                }
                let (learnt, backtrack) = self.analyze(confl);
                self.cancel_until(backtrack);
                if learnt.len() == 1 {
                    self.enqueue(learnt[0], None);
                } else {
                    let first = learnt[0];
                    let cr = self.attach(learnt);
                    self.enqueue(first, Some(cr));
                }
                self.var_inc /= ACTIVITY_DECAY;
                continue;
            }

            if limits.conflicts > 0 && self.conflicts - start >= limits.conflicts {
                return SearchStatus::Done(SatOutcome::Unknown(format!(
                    "conflict budget of {} exhausted",
                    limits.conflicts
                )));
            }
            if let Some(deadline) = limits.deadline {
                if Instant::now() >= deadline {
                    return SearchStatus::Done(SatOutcome::Unknown("timeout".to_string()));
                }
            }
            if local >= budget {
                self.cancel_until(0);
                return SearchStatus::Restart;
            }

            let mut next = None;
            while self.decision_level() < assumptions.len() {
                let a = assumptions[self.decision_level()];
                match self.value(a) {
                    Some(true) => self.trail_lim.push(self.trail.len()),
                    Some(false) => {
                        let core = self.analyze_final(a);
                        return SearchStatus::Done(SatOutcome::Unsat(core));
                    }
                    None => {
                        next = Some(a);
                        break;
                    }
                }
            }
            let decision = match next {
                Some(a) => a,
                None => match self.pick_branch() {
                    Some(lit) => lit,
                    None => return SearchStatus::Done(SatOutcome::Sat),
                },
            };
            self.trail_lim.push(self.trail.len());
            self.enqueue(decision, None);
        }
    }

    /// Decide the clause set under `assumptions`
    ///
    /// After `Sat`, `model_value` reads the model until the next call.
    pub fn solve(&mut self, assumptions: &[Lit], limits: Limits) -> SatOutcome {
        if !self.ok {
            return SatOutcome::Unsat(Vec::new());
        }
        self.cancel_until(0);
        if self.propagate().is_some() {
            self.ok = false;
            return SatOutcome::Unsat(Vec::new());
        }
        let start = self.conflicts;
        let mut round = 0u64;
        loop {
            let budget = luby(round) * RESTART_BASE;
            match self.search(budget, assumptions, &limits, start) {
                SearchStatus::Done(outcome) => return outcome,
                SearchStatus::Restart => round += 1,
            }
        }
    }
}
