//! Emission of the supporting project files: activity stubs, the worker
//! entry point, and the client starter script.

use std::collections::HashSet;

use crate::classify::{Classification, StepKind};
use crate::codegen::value_expr::py_str;
use crate::codegen::writer::PyWriter;
use crate::codegen::{pascal_case, py_ident};
use crate::config::EmitterConfig;
use crate::ir::{walk_ops, CanonicalOp, TranslationIr};

/// Activity names referenced by the program, in first-use order. Dynamic
/// parallels name their activities at runtime and cannot be stubbed.
pub fn activity_names(ir: &TranslationIr, classification: &Classification) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut names = Vec::new();
    walk_ops(&ir.program, &mut |op| {
        if let CanonicalOp::Step(s) = op {
            if classification.kind_of(&s.id) != StepKind::PureCompute
                && seen.insert(s.activity.clone())
            {
                names.push(s.activity.clone());
            }
        }
    });
    names
}

pub fn emit_activities(ir: &TranslationIr, classification: &Classification) -> String {
    let names = activity_names(ir, classification);
    let mut w = PyWriter::new();

    w.line(&format!(
        "\"\"\"Activity stubs for '{}'. Replace each body with a real implementation.\"\"\"",
        ir.metadata.name
    ));
    w.blank();
    w.line("from __future__ import annotations");
    w.blank();
    w.line("from typing import Any, Dict");
    w.blank();
    w.line("from temporalio import activity");

    for name in &names {
        let ident = py_ident(name);
        w.blank();
        w.blank();
        w.line(&format!("@activity.defn(name='{}')", name));
        w.block(&format!(
            "async def {}(payload: Dict[str, Any]) -> Dict[str, Any]",
            ident
        ));
        w.line(&format!("activity.logger.info('{} invoked')", name));
        w.line(&format!("raise NotImplementedError('{} is not implemented')", name));
        w.end_block();
    }

    w.into_string()
}

pub fn emit_worker(
    ir: &TranslationIr,
    classification: &Classification,
    config: &EmitterConfig,
) -> String {
    let names = activity_names(ir, classification);
    let idents: Vec<String> = names.iter().map(|n| py_ident(n)).collect();
    let class_name = pascal_case(&ir.metadata.name);
    let task_queue = config
        .task_queue
        .clone()
        .unwrap_or_else(|| kebab_case(&ir.metadata.name));

    let mut w = PyWriter::new();
    w.line(&format!(
        "\"\"\"Worker entry point for the '{}' workflow.\"\"\"",
        ir.metadata.name
    ));
    w.blank();
    w.line("from __future__ import annotations");
    w.blank();
    w.line("import asyncio");
    w.blank();
    w.line("from temporalio.client import Client");
    w.line("from temporalio.worker import Worker");
    w.blank();
    if !idents.is_empty() {
        w.line(&format!("from activities import {}", idents.join(", ")));
    }
    w.line(&format!("from workflow import {}", class_name));
    w.blank();
    w.blank();
    w.block("async def main() -> None");
    w.line("client = await Client.connect('localhost:7233')");
    w.line("worker = Worker(");
    w.indent();
    w.line("client,");
    w.line(&format!("task_queue='{}',", task_queue));
    w.line(&format!("workflows=[{}],", class_name));
    w.line(&format!("activities=[{}],", idents.join(", ")));
    w.dedent();
    w.line(")");
    w.line("await worker.run()");
    w.end_block();
    w.blank();
    w.blank();
    w.block("if __name__ == '__main__'");
    w.line("asyncio.run(main())");
    w.end_block();

    w.into_string()
}

/// Client script that starts the workflow and walks its interaction surface:
/// hints for every exposed update and signal, the status query, and the
/// final result.
pub fn emit_starter(
    ir: &TranslationIr,
    classification: &Classification,
    config: &EmitterConfig,
) -> String {
    let class_name = pascal_case(&ir.metadata.name);
    let kebab = kebab_case(&ir.metadata.name);
    let task_queue = config.task_queue.clone().unwrap_or_else(|| kebab.clone());
    let contract = classification.contract();

    let input = if ir.input_parameters.is_empty() {
        "{}".to_string()
    } else {
        let fields: Vec<String> = ir
            .input_parameters
            .iter()
            .map(|name| format!("{}: None", py_str(name)))
            .collect();
        format!("{{{}}}", fields.join(", "))
    };

    let mut w = PyWriter::new();
    w.line(&format!(
        "\"\"\"Starter script for launching the '{}' workflow.\"\"\"",
        ir.metadata.name
    ));
    w.blank();
    w.line("from __future__ import annotations");
    w.blank();
    w.line("import asyncio");
    w.line("import json");
    w.line("from uuid import uuid4");
    w.blank();
    w.line("from temporalio.client import Client");
    w.blank();
    w.line(&format!("from workflow import {}", class_name));
    w.blank();
    w.blank();
    w.block("async def main() -> None");
    w.line("client = await Client.connect('localhost:7233')");
    w.blank();
    w.line("handle = await client.start_workflow(");
    w.indent();
    w.line(&format!("{}.run,", class_name));
    w.line(&format!("{},", input));
    w.line(&format!("id=f'{}-{{uuid4()}}',", kebab));
    w.line(&format!("task_queue='{}',", task_queue));
    w.dedent();
    w.line(")");
    w.line("print('started', handle.id)");

    for name in &contract.updates {
        w.blank();
        w.line(&format!(
            "# Deliver the '{}' input and wait for the acknowledgement:",
            name
        ));
        w.line(&format!(
            "# await handle.execute_update({}.resolve_{}, {{}})",
            class_name,
            py_ident(name)
        ));
    }
    for name in &contract.signals {
        w.blank();
        w.line(&format!("# Deliver the '{}' input:", name));
        w.line(&format!(
            "# await handle.signal({}.resolve_{}, {{}})",
            class_name,
            py_ident(name)
        ));
    }

    w.blank();
    w.line(&format!("status = await handle.query({}.status)", class_name));
    w.line("print(json.dumps(status, indent=2))");
    w.blank();
    w.line("result = await handle.result()");
    w.line("print(json.dumps(result, indent=2))");
    w.end_block();
    w.blank();
    w.blank();
    w.block("if __name__ == '__main__'");
    w.line("asyncio.run(main())");
    w.end_block();

    w.into_string()
}

pub fn kebab_case(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kebab() {
        assert_eq!(kebab_case("Order Flow v2"), "order-flow-v2");
        assert_eq!(kebab_case("schema_approval"), "schema-approval");
    }
}
