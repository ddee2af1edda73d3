//! Static gas estimate: a pluggable cost function over the compiled
//! program, not enforced at runtime in this version (spec §4.5, §9 Open
//! Question 1).

use super::ast::{Expr, FnDecl, Program, Stmt};
use rust_decimal::Decimal;

pub trait GasEstimator {
    fn estimate(&self, program: &Program) -> Decimal;
}

/// Default policy: AST node count times a constant (spec §9.1: "implementers
/// should expose it as a pluggable policy and default to a simple
/// 'AST-node count x constant' estimate").
pub struct NodeCountEstimator {
    pub cost_per_node: Decimal,
}

impl Default for NodeCountEstimator {
    fn default() -> Self {
        NodeCountEstimator { cost_per_node: Decimal::from(1) }
    }
}

impl GasEstimator for NodeCountEstimator {
    fn estimate(&self, program: &Program) -> Decimal {
        let nodes: u64 = program.functions.iter().map(count_fn_nodes).sum();
        Decimal::from(nodes) * self.cost_per_node
    }
}

fn count_fn_nodes(f: &FnDecl) -> u64 {
    1 + f.body.iter().map(count_stmt_nodes).sum::<u64>()
}

fn count_stmt_nodes(stmt: &Stmt) -> u64 {
    match stmt {
        Stmt::Let(_, e) | Stmt::Assign(_, e) | Stmt::Expr(e) => 1 + count_expr_nodes(e),
        Stmt::IndexAssign(t, i, v) => {
            1 + count_expr_nodes(t) + count_expr_nodes(i) + count_expr_nodes(v)
        }
        Stmt::If(cond, then_branch, else_branch) => {
            1 + count_expr_nodes(cond)
                + then_branch.iter().map(count_stmt_nodes).sum::<u64>()
                + else_branch.iter().map(count_stmt_nodes).sum::<u64>()
        }
        Stmt::While(cond, body) => {
            1 + count_expr_nodes(cond) + body.iter().map(count_stmt_nodes).sum::<u64>()
        }
        Stmt::Return(Some(e)) => 1 + count_expr_nodes(e),
        Stmt::Return(None) => 1,
    }
}

fn count_expr_nodes(expr: &Expr) -> u64 {
    match expr {
        Expr::Int(_) | Expr::Decimal(_) | Expr::Str(_) | Expr::Bool(_) | Expr::Ident(_) => 1,
        Expr::Array(items) => 1 + items.iter().map(count_expr_nodes).sum::<u64>(),
        Expr::Unary(_, inner) => 1 + count_expr_nodes(inner),
        Expr::Binary(l, _, r) => 1 + count_expr_nodes(l) + count_expr_nodes(r),
        Expr::Index(t, i) => 1 + count_expr_nodes(t) + count_expr_nodes(i),
        Expr::Call(_, args) => 1 + args.iter().map(count_expr_nodes).sum::<u64>(),
        Expr::MethodCall(recv, _, args) => {
            1 + count_expr_nodes(recv) + args.iter().map(count_expr_nodes).sum::<u64>()
        }
        Expr::Field(recv, _) => 1 + count_expr_nodes(recv),
    }
}
