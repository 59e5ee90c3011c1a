//! Task automata and the global scheduling declarations.

use std::fmt::Write;

use super::{Automaton, Edge, Location, Role, Symbols};
use crate::model::{ComponentId, Scheduler, TimingModel};

/// Build the automaton for component `id`.
///
/// Periodic: `Init → Exec` at time zero, then `Idle → Exec` every period.
/// Event-triggered: `Idle → Release` on any upstream `done`, then
/// `Release → Exec`; a source-less one fires once from `Init`. Under
/// non-preemptive dispatch a `Ready` location sits before `Exec`.
pub(super) fn build(model: &TimingModel, sym: &Symbols, id: ComponentId) -> Automaton {
    let comp = model.component(id);
    let np = sym.scheduler == Scheduler::NonPreemptiveFp;
    let start = format!("{}!", sym.start(id));
    let done = format!("{}!", sym.done(id));
    let release = format!("x = 0, c = 0, ready[{}] = true", id);
    let finish = if np {
        format!("ready[{id}] = false, running[core_of[{id}]] = -1")
    } else {
        format!("ready[{}] = false", id)
    };
    let wcet = comp.wcet.0;

    let mut a = Automaton {
        name: format!("Task_{}", sym.base[id]),
        role: Role::Task { component: id },
        clocks: vec!["x".to_string(), "c".to_string()],
        locations: Vec::new(),
        edges: Vec::new(),
        init: 0,
    };

    let upstream = model.upstream(id);
    let init = match comp.period {
        Some(_) => Some(a.add(Location::committed("Init"))),
        None if upstream.is_empty() => Some(a.add(Location::committed("Init"))),
        None => None,
    };
    let idle = match comp.period {
        Some(p) => a.add(Location::normal("Idle").with_invariant(format!("x <= {}", p.0))),
        None => a.add(Location::normal("Idle")),
    };
    let ready = np.then(|| a.add(Location::normal("Ready")));
    let exec = a.add(Location::normal("Exec").with_invariant(format!(
        "c <= {} && c' == (is_running({}) ? 1 : 0)",
        wcet, id
    )));
    let released = ready.unwrap_or(exec);
    a.init = init.unwrap_or(idle);

    if let Some(r) = ready {
        a.edges.push(
            Edge::new(r, exec)
                .guard(format!("running[core_of[{id}]] < 0 && is_top({id})"))
                .sync("go!")
                .update(format!("running[core_of[{id}]] = {id}")),
        );
    }

    match comp.period {
        Some(period) => {
            let p = period.0;
            let overrun = a.add(Location::committed("Overrun"));
            if let Some(init) = init {
                a.edges.push(Edge::new(init, released).sync(&start).update(&release));
            }
            a.edges.push(
                Edge::new(idle, released)
                    .guard(format!("x == {}", p))
                    .sync(&start)
                    .update(&release),
            );
            a.edges.push(
                Edge::new(exec, idle)
                    .guard(format!("c == {} && x < {}", wcet, p))
                    .sync(&done)
                    .update(&finish),
            );
            // Completion at or past the next release point: release again
            // straight away.
            a.edges.push(
                Edge::new(exec, overrun)
                    .guard(format!("c == {} && x >= {}", wcet, p))
                    .sync(&done)
                    .update(&finish),
            );
            a.edges.push(Edge::new(overrun, released).sync(&start).update(&release));
        }
        None => {
            let rel = a.add(Location::committed("Release"));
            if let Some(init) = init {
                a.edges.push(Edge::new(init, rel));
            }
            for &up in &upstream {
                a.edges.push(Edge::new(idle, rel).sync(format!("{}?", sym.done(up))));
            }
            a.edges.push(Edge::new(rel, released).sync(&start).update(&release));
            a.edges.push(
                Edge::new(exec, idle)
                    .guard(format!("c == {}", wcet))
                    .sync(&done)
                    .update(&finish),
            );
        }
    }

    if let Some(deadline) = comp.deadline {
        let miss = a.add(Location::normal("DeadlineMiss"));
        let guard = format!("x > {}", deadline.0);
        if let Some(r) = ready {
            a.edges.push(Edge::new(r, miss).guard(&guard));
        }
        a.edges.push(Edge::new(exec, miss).guard(guard));
    }

    a
}

/// Global declarations: dispatch tables, channels and the predicates the
/// execution stopwatches read.
pub(super) fn declarations(model: &TimingModel, sym: &Symbols) -> String {
    let n = model.components().len();
    let cores = model.cpu().cores.max(1);
    let join = |items: Vec<String>| items.join(", ");

    let mut out = String::new();
    let _ = writeln!(out, "// {} tasks on {} core(s), {}", n, cores, sym.scheduler);
    let _ = writeln!(out, "const int N_TASKS = {};", n);
    let _ = writeln!(out, "const int N_CORES = {};", cores);
    let _ = writeln!(out, "typedef int[0, N_TASKS - 1] task_t;");
    out.push('\n');
    let _ = writeln!(
        out,
        "const int prio_rank[N_TASKS] = {{ {} }};",
        join(sym.rank.iter().map(|r| r.to_string()).collect())
    );
    let _ = writeln!(
        out,
        "const int core_of[N_TASKS] = {{ {} }};",
        join(sym.core.iter().map(|c| c.to_string()).collect())
    );
    let _ = writeln!(out, "bool ready[N_TASKS];");
    out.push('\n');
    for id in 0..n {
        let _ = writeln!(out, "broadcast chan {}, {};", sym.start(id), sym.done(id));
    }
    if sym.scheduler == Scheduler::NonPreemptiveFp {
        let _ = writeln!(out, "urgent broadcast chan go;");
        let _ = writeln!(
            out,
            "int[-1, N_TASKS - 1] running[N_CORES] = {{ {} }};",
            join(vec!["-1".to_string(); cores as usize])
        );
    }
    out.push('\n');

    out.push_str(
        "bool is_top(task_t i) {\n\
         \x20   for (j : task_t) {\n\
         \x20       if (ready[j] && core_of[j] == core_of[i] && prio_rank[j] < prio_rank[i]) {\n\
         \x20           return false;\n\
         \x20       }\n\
         \x20   }\n\
         \x20   return true;\n\
         }\n\n",
    );
    match sym.scheduler {
        Scheduler::PreemptiveFp => out.push_str(
            "bool is_running(task_t i) {\n\
             \x20   return ready[i] && is_top(i);\n\
             }\n",
        ),
        Scheduler::NonPreemptiveFp => out.push_str(
            "bool is_running(task_t i) {\n\
             \x20   return running[core_of[i]] == i;\n\
             }\n",
        ),
    }
    out
}
