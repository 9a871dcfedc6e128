//! Runtime-argument validation against component contracts.
//!
//! A wrong kernel invocation is far costlier than in ordinary code: it
//! silently returns numerically wrong results, because no type system checks
//! variable identity at call time. The validator therefore checks every
//! concrete call's arguments against the same [`ComponentSpec`] the compiler
//! consumed, before the kernel runs.
//!
//! The checks form a pure pipeline with no state machine, always in the
//! fixed order input → params → states → networks. The single-component
//! [`check`] stops at the first failing stage; the batch variants
//! ([`check_all`]) run the full check independently per component so one
//! failure never masks the rest.

use crate::errors::{KernelError, KernelResult};
use crate::kernel::{NetworkBag, ParamBag};
use crate::rank::Rank;
use crate::spec::{ComponentSpec, VarCategory};
use ndarray::{ArrayView2, ArrayView3, Axis};
use petgraph::graph::Graph;
use petgraph::visit::{depth_first_search, DfsEvent};

/// The per-call input array: variables x time, or variables x grid x time.
#[derive(Debug, Clone, Copy)]
pub enum InputArray<'a> {
    TwoD(ArrayView2<'a, f64>),
    ThreeD(ArrayView3<'a, f64>),
}

impl InputArray<'_> {
    fn variable_count(&self) -> usize {
        match self {
            InputArray::TwoD(a) => a.nrows(),
            InputArray::ThreeD(a) => a.len_of(Axis(0)),
        }
    }

    fn time_len(&self) -> usize {
        match self {
            InputArray::TwoD(a) => a.ncols(),
            InputArray::ThreeD(a) => a.len_of(Axis(2)),
        }
    }

    fn shape_hint(&self) -> String {
        match self {
            InputArray::TwoD(a) => format!("input is (variables x time) = {:?}", a.shape()),
            InputArray::ThreeD(a) => {
                format!("input is (variables x grid x time) = {:?}", a.shape())
            }
        }
    }
}

/// Everything the solver layer hands over for one sequence of calls.
pub struct RuntimeArgs<'a> {
    pub input: InputArray<'a>,
    pub params: &'a ParamBag,
    pub init_states: &'a ParamBag,
    pub networks: &'a NetworkBag,
    pub time_index: &'a [f64],
}

/// Verify the input array's variable axis and time axis against the contract.
pub fn check_input(
    spec: &ComponentSpec,
    input: &InputArray<'_>,
    time_index: &[f64],
) -> KernelResult<()> {
    let expected = spec.count_of(VarCategory::Inputs);
    let actual = input.variable_count();
    if actual != expected {
        return Err(KernelError::ShapeMismatch {
            context: format!("input array for component '{}'", spec.name),
            expected,
            actual,
            hint: input.shape_hint(),
        });
    }

    let time_len = input.time_len();
    if time_len != time_index.len() {
        return Err(KernelError::ShapeMismatch {
            context: format!("time axis for component '{}'", spec.name),
            expected: time_index.len(),
            actual: time_len,
            hint: "last axis length must equal the time index length".to_string(),
        });
    }
    Ok(())
}

fn check_presence(
    spec: &ComponentSpec,
    category: VarCategory,
    available: impl Iterator<Item = String>,
) -> KernelResult<()> {
    let mut available: Vec<String> = available.collect();
    available.sort();
    let missing: Vec<String> = spec
        .names(category)
        .iter()
        .filter(|n| !available.contains(n))
        .cloned()
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(KernelError::MissingKey {
            category: category.to_string(),
            missing,
            available,
        })
    }
}

/// Verify every declared parameter is present.
pub fn check_params(spec: &ComponentSpec, params: &ParamBag) -> KernelResult<()> {
    check_presence(spec, VarCategory::Params, params.keys().cloned())
}

/// Verify every declared state has an initial value.
///
/// Additionally warns (non-fatally) when a state's dimensionality exceeds
/// what the rank implies.
pub fn check_init_states(
    spec: &ComponentSpec,
    init_states: &ParamBag,
    rank: Rank,
) -> KernelResult<()> {
    check_presence(spec, VarCategory::States, init_states.keys().cloned())?;

    let limit = rank.state_ndim_limit();
    for name in &spec.states {
        if let Some(value) = init_states.get(name) {
            if value.ndim() > limit {
                log::warn!(
                    "initial state '{}' of component '{}' is {}-d but {} rank implies at most {}-d",
                    name,
                    spec.name,
                    value.ndim(),
                    rank,
                    limit
                );
            }
        }
    }
    Ok(())
}

/// Verify every declared network slot has a supplied sub-model.
pub fn check_networks(spec: &ComponentSpec, networks: &NetworkBag) -> KernelResult<()> {
    check_presence(spec, VarCategory::Networks, networks.keys().cloned())
}

/// Non-fatal value scan for NaN, infinity and (optionally) negatives.
///
/// A diagnostic, not a gate: findings are logged and returned, execution
/// never blocks on them.
pub fn check_values(values: &ParamBag, allow_negative: bool) -> Vec<String> {
    let mut findings = Vec::new();
    let mut names: Vec<&String> = values.keys().collect();
    names.sort();
    for name in names {
        let value = &values[name];
        if value.has_non_finite() {
            log::warn!("value '{}' contains NaN or infinite entries", name);
            findings.push(name.clone());
        } else if !allow_negative && value.has_negative() {
            log::warn!("value '{}' contains negative entries", name);
            findings.push(name.clone());
        }
    }
    findings
}

/// Full single-component check, short-circuiting at the first failing stage.
pub fn check(spec: &ComponentSpec, args: &RuntimeArgs<'_>, rank: Rank) -> KernelResult<()> {
    check_input(spec, &args.input, args.time_index)?;
    check_params(spec, args.params)?;
    check_init_states(spec, args.init_states, rank)?;
    check_networks(spec, args.networks)?;
    Ok(())
}

/// Lazily check each component, yielding one result per component.
///
/// One failing component never masks the rest: every item is the full
/// [`check`] for that component, keyed by its name.
pub fn check_each<'a>(
    checks: impl IntoIterator<Item = (&'a ComponentSpec, &'a RuntimeArgs<'a>, Rank)> + 'a,
) -> impl Iterator<Item = (String, KernelResult<()>)> + 'a {
    checks
        .into_iter()
        .map(|(spec, args, rank)| (spec.name.clone(), check(spec, args, rank)))
}

/// Eager counterpart of [`check_each`], collecting all results.
pub fn check_all<'a>(
    checks: impl IntoIterator<Item = (&'a ComponentSpec, &'a RuntimeArgs<'a>, Rank)> + 'a,
) -> Vec<(String, KernelResult<()>)> {
    check_each(checks).collect()
}

/// Walk an ordered component chain and verify every input is satisfied.
///
/// The available set is seeded with `initial_vars`; each component's inputs
/// must be covered before its outputs join the set. This guarantees a
/// pipeline is topologically valid before any kernel executes.
///
/// Returns the final available set, in accumulation order.
pub fn check_dependency_chain(
    specs: &[ComponentSpec],
    initial_vars: &[&str],
) -> KernelResult<Vec<String>> {
    let mut available: Vec<String> = initial_vars.iter().map(|n| n.to_string()).collect();

    for (position, spec) in specs.iter().enumerate() {
        let missing: Vec<String> = spec
            .inputs
            .iter()
            .filter(|n| !available.contains(n))
            .cloned()
            .collect();
        if !missing.is_empty() {
            return Err(KernelError::ChainValidation {
                position: position + 1,
                component: spec.name.clone(),
                missing,
                available,
            });
        }
        for output in &spec.outputs {
            if !available.contains(output) {
                available.push(output.clone());
            }
        }
    }
    Ok(available)
}

/// Build the producer-to-consumer graph of a component chain.
///
/// Nodes are component names; an edge carries the variable name an earlier
/// component produces and a later one consumes. Purely diagnostic.
pub fn dependency_graph(specs: &[ComponentSpec]) -> Graph<String, String> {
    let mut graph = Graph::new();
    let indexes: Vec<_> = specs
        .iter()
        .map(|spec| graph.add_node(spec.name.clone()))
        .collect();

    for (i, consumer) in specs.iter().enumerate() {
        for input in &consumer.inputs {
            for (j, producer) in specs.iter().enumerate().take(i) {
                if producer.outputs.contains(input) {
                    graph.add_edge(indexes[j], indexes[i], input.clone());
                }
            }
        }
    }
    graph
}

/// Check that a dependency graph contains no cycles.
///
/// A self-referential edge is tolerated; a cycle between distinct components
/// is not, since neither could then be solved first.
pub fn is_valid_chain_graph(graph: &Graph<String, String>) -> bool {
    depth_first_search(graph, graph.node_indices(), |event| match event {
        DfsEvent::BackEdge(a, b) => {
            if a == b {
                Ok(())
            } else {
                Err(())
            }
        }
        _ => Ok(()),
    })
    .is_ok()
}
