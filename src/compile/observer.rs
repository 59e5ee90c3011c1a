//! Latency and response observers.

use super::{Automaton, Edge, Location, Role, Symbols};
use crate::model::{ConnectionId, TimingModel};

/// `Idle --done_A?--> Wait --start_B?--> Idle`, with `Wait → Bad` once the
/// handoff clock passes the budget. A zero budget means any delay is bad.
pub(super) fn latency(model: &TimingModel, sym: &Symbols, cid: ConnectionId, name: String) -> Automaton {
    let conn = &model.connections()[cid];
    let budget = conn.latency_budget.map_or(0, |b| b.0);

    let mut a = Automaton {
        name,
        role: Role::Latency { connection: cid },
        clocks: vec!["e".to_string()],
        locations: Vec::new(),
        edges: Vec::new(),
        init: 0,
    };
    let idle = a.add(Location::normal("Idle"));
    let wait = a.add(Location::normal("Wait"));
    let bad = a.add(Location::normal("Bad"));
    a.init = idle;

    a.edges.push(
        Edge::new(idle, wait)
            .sync(format!("{}?", sym.done(conn.source.component)))
            .update("e = 0"),
    );
    a.edges.push(Edge::new(wait, idle).sync(format!("{}?", sym.start(conn.target.component))));
    a.edges.push(Edge::new(wait, bad).guard(format!("e > {}", budget)));
    a
}

/// Follows one activation of the stimulus through `path` to the response.
///
/// `Idle --start_S?--> Run0 --done_u1?--> Hop1 --start_v1?--> Run1 ... --done_R?--> Idle`.
/// Any non-idle location moves to `Bad` when the end-to-end clock `t`
/// passes the bound; a hop over a budgeted connection also moves to `Bad`
/// when its handoff clock `e` passes the budget. Without a path the
/// observer just waits for the next response completion.
pub(super) fn response(
    model: &TimingModel,
    sym: &Symbols,
    pidx: usize,
    path: Option<Vec<ConnectionId>>,
    name: String,
) -> Automaton {
    let prop = &model.properties()[pidx];
    let bound = prop.bound().0;
    let over = format!("t > {}", bound);

    let mut a = Automaton {
        name,
        role: Role::Response {
            property: pidx,
            path: path.clone(),
        },
        clocks: vec!["t".to_string(), "e".to_string()],
        locations: Vec::new(),
        edges: Vec::new(),
        init: 0,
    };
    let idle = a.add(Location::normal("Idle"));
    let bad = a.add(Location::normal("Bad"));
    a.init = idle;

    let first = match path {
        Some(_) => "Run0",
        None => "Wait",
    };
    let mut run = a.add(Location::normal(first));
    a.edges.push(
        Edge::new(idle, run)
            .sync(format!("{}?", sym.start(prop.stimulus())))
            .update("t = 0"),
    );
    a.edges.push(Edge::new(run, bad).guard(&over));

    for (k, &cid) in path.iter().flatten().enumerate() {
        let conn = &model.connections()[cid];
        let hop = a.add(Location::normal(&format!("Hop{}", k + 1)));
        a.edges.push(
            Edge::new(run, hop)
                .sync(format!("{}?", sym.done(conn.source.component)))
                .update("e = 0"),
        );
        a.edges.push(Edge::new(hop, bad).guard(&over));
        if let Some(budget) = conn.latency_budget {
            a.edges.push(Edge::new(hop, bad).guard(format!("e > {}", budget.0)));
        }

        let next = a.add(Location::normal(&format!("Run{}", k + 1)));
        a.edges.push(Edge::new(hop, next).sync(format!("{}?", sym.start(conn.target.component))));
        a.edges.push(Edge::new(next, bad).guard(&over));
        run = next;
    }

    a.edges.push(Edge::new(run, idle).sync(format!("{}?", sym.done(prop.response()))));
    a
}
