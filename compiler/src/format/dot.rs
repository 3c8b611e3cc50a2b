// dot.rs — Graphviz DOT output for stencil solutions
//
// Renders every equation as a small dataflow graph: operands flow into
// operator nodes, the RHS root flows into an EQUALS node, and EQUALS writes
// the LHS point. Point nodes are shared across equations, so a point read
// by several equations (or written by one and read by another) appears once.
// Each point also links to its grid with a dashed edge.
//
// Preconditions: `solution` holds only valid equations.
// Postconditions: output depends only on the solution's grids and equations
//   (not on element width) and is identical across calls.
// Failure modes: none (pure string formatting).
// Side effects: none.

use std::collections::HashMap;
use std::fmt::Write;

use crate::expr::{format_number, Expr};
use crate::grid::PointRef;
use crate::id::{IdAllocator, NodeId};
use crate::solution::Solution;

use super::{sanitize, Formatter};
use crate::error::Result;

pub struct DotFormatter;

impl Formatter for DotFormatter {
    fn id(&self) -> &str {
        "dot"
    }

    fn description(&self) -> String {
        "Graphviz DOT dataflow graph".to_string()
    }

    fn render(&self, solution: &Solution) -> Result<String> {
        Ok(emit_dot(solution))
    }
}

// ── Graph model ─────────────────────────────────────────────────────────────

enum NodeKind {
    Equals,
    Op(&'static str),
    Const(f64),
    Point(String),
}

struct DotNode {
    id: NodeId,
    kind: NodeKind,
}

struct DotEdge {
    source: NodeId,
    target: NodeId,
}

/// Equation-local nodes; emitted inside the equation's cluster.
struct EquationGroup {
    index: usize,
    text: String,
    nodes: Vec<DotNode>,
}

#[derive(Default)]
struct DotGraph<'a> {
    ids: IdAllocator,
    points: Vec<(NodeId, &'a PointRef)>,
    point_ids: HashMap<&'a PointRef, NodeId>,
    groups: Vec<EquationGroup>,
    edges: Vec<DotEdge>,
}

impl<'a> DotGraph<'a> {
    fn build(solution: &'a Solution) -> Self {
        let mut g = DotGraph::default();
        for (index, eq) in solution.equations().iter().enumerate() {
            let mut group = EquationGroup {
                index,
                text: eq.format_simple(),
                nodes: Vec::new(),
            };
            let equals = g.ids.alloc_node();
            group.nodes.push(DotNode {
                id: equals,
                kind: NodeKind::Equals,
            });
            let lhs = g.point_node(eq.lhs());
            g.edge(equals, lhs);
            let root = g.visit(eq.rhs(), &mut group);
            g.edge(root, equals);
            g.groups.push(group);
        }
        g
    }

    /// Pre-order: an operator's id is allocated before its operands'.
    fn visit(&mut self, expr: &'a Expr, group: &mut EquationGroup) -> NodeId {
        match expr {
            Expr::Point(p) => self.point_node(p),
            Expr::Const(v) => {
                let id = self.ids.alloc_node();
                group.nodes.push(DotNode {
                    id,
                    kind: NodeKind::Const(*v),
                });
                id
            }
            Expr::Binary { op, lhs, rhs } => {
                let id = self.ids.alloc_node();
                group.nodes.push(DotNode {
                    id,
                    kind: NodeKind::Op(op.symbol()),
                });
                let l = self.visit(lhs, group);
                self.edge(l, id);
                let r = self.visit(rhs, group);
                self.edge(r, id);
                id
            }
        }
    }

    fn point_node(&mut self, point: &'a PointRef) -> NodeId {
        if let Some(&id) = self.point_ids.get(point) {
            return id;
        }
        let id = self.ids.alloc_node();
        self.point_ids.insert(point, id);
        self.points.push((id, point));
        id
    }

    fn edge(&mut self, source: NodeId, target: NodeId) {
        self.edges.push(DotEdge { source, target });
    }
}

// ── Emission ────────────────────────────────────────────────────────────────

/// Emit the solution as a Graphviz DOT string.
pub fn emit_dot(solution: &Solution) -> String {
    let graph = DotGraph::build(solution);
    let mut buf = String::new();

    let _ = writeln!(buf, "digraph \"{}\" {{", escape(solution.name()));
    let _ = writeln!(buf, "    rankdir=BT;");
    let _ = writeln!(buf, "    node [fontname=\"Helvetica\", fontsize=10];");
    let _ = writeln!(buf, "    edge [fontname=\"Helvetica\", fontsize=9];");

    if solution.num_grids() > 0 {
        let _ = writeln!(buf);
        let _ = writeln!(buf, "    // Grids");
        for grid in solution.grids() {
            let _ = writeln!(
                buf,
                "    grid_{} [shape=cylinder, style=filled, fillcolor=lightsalmon, label=\"{}\"];",
                sanitize(grid.name()),
                escape(&grid.to_string())
            );
        }
    }

    if !graph.points.is_empty() {
        let _ = writeln!(buf);
        let _ = writeln!(buf, "    // Points");
        for (id, point) in &graph.points {
            let _ = writeln!(
                buf,
                "    {id} [{}];",
                node_attrs(&NodeKind::Point(point.format_simple()))
            );
        }
    }

    for group in &graph.groups {
        let _ = writeln!(buf);
        let _ = writeln!(buf, "    subgraph cluster_eq{} {{", group.index);
        let _ = writeln!(buf, "        label=\"{}\";", escape(&group.text));
        let _ = writeln!(buf, "        style=rounded;");
        let _ = writeln!(buf, "        color=gray50;");
        for node in &group.nodes {
            let _ = writeln!(buf, "        {} [{}];", node.id, node_attrs(&node.kind));
        }
        let _ = writeln!(buf, "    }}");
    }

    if !graph.edges.is_empty() {
        let _ = writeln!(buf);
        let _ = writeln!(buf, "    // Dataflow");
        for e in &graph.edges {
            let _ = writeln!(buf, "    {} -> {};", e.source, e.target);
        }
    }

    if !graph.points.is_empty() {
        let _ = writeln!(buf);
        let _ = writeln!(buf, "    // Storage");
        for (id, point) in &graph.points {
            let _ = writeln!(
                buf,
                "    {id} -> grid_{} [style=dashed, arrowhead=none, color=gray60];",
                sanitize(point.grid().name())
            );
        }
    }

    let _ = writeln!(buf, "}}");
    buf
}

// ── Helpers ─────────────────────────────────────────────────────────────────

fn node_attrs(kind: &NodeKind) -> String {
    let (shape, color, label) = match kind {
        NodeKind::Equals => ("doubleoctagon", "lightblue", "EQUALS".to_string()),
        NodeKind::Op(sym) => ("circle", "lightgreen", sym.to_string()),
        NodeKind::Const(v) => ("plaintext", "white", format_number(*v)),
        NodeKind::Point(text) => ("box", "lightyellow", text.clone()),
    };
    format!(
        "shape={shape}, style=filled, fillcolor={color}, label=\"{}\"",
        escape(&label)
    )
}

fn escape(s: &str) -> String {
    s.replace('\\', "\\\\").replace('"', "\\\"")
}
