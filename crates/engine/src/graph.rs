use std::collections::HashMap;
use std::fmt;

use crate::error::{EngineError, EngineResult};

/// Format a number the way it appears inside filter options: no trailing zeros, at most 3 decimals.
pub fn num(value: f64) -> String {
    let rounded = (value * 1000.0).round() / 1000.0;
    if rounded == 0.0 {
        return "0".to_string();
    }
    let text = format!("{:.3}", rounded);
    let text = text.trim_end_matches('0').trim_end_matches('.');
    text.to_string()
}

/// Whether a label names an input stream directly (`0`, `1:v`, `2:a`) rather than a filter output.
pub fn is_input_specifier(label: &str) -> bool {
    input_index(label).is_some()
}

fn input_index(label: &str) -> Option<usize> {
    let (index, stream) = match label.split_once(':') {
        Some((index, stream)) => (index, Some(stream)),
        None => (label, None),
    };
    if let Some(stream) = stream {
        if stream != "v" && stream != "a" {
            return None;
        }
    }
    if index.is_empty() || !index.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    index.parse().ok()
}

/// The label currently available for consumption. Threaded by value through every chain builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Context {
    input: String,
}

impl Context {
    pub fn new(input: impl Into<String>) -> Self {
        Context {
            input: input.into(),
        }
    }

    pub fn from_input(index: usize, stream: char) -> Self {
        Context::new(format!("{}:{}", index, stream))
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn is_raw_input(&self) -> bool {
        is_input_specifier(&self.input)
    }
}

impl fmt::Display for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.input)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterStep {
    pub inputs: Vec<String>,
    pub filter: String,
    pub outputs: Vec<String>,
}

impl fmt::Display for FilterStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for input in &self.inputs {
            write!(f, "[{}]", input)?;
        }
        f.write_str(&self.filter)?;
        for output in &self.outputs {
            write!(f, "[{}]", output)?;
        }
        Ok(())
    }
}

/// A filter_complex program under construction. Owns the label counter, so labels are unique
/// across every node and scene compiled into it.
#[derive(Debug, Clone, Default)]
pub struct FilterGraph {
    steps: Vec<FilterStep>,
    next_id: u64,
}

impl FilterGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next_label(&mut self, tag: &str) -> String {
        let label = format!("{}{}", tag, self.next_id);
        self.next_id += 1;
        label
    }

    pub fn steps(&self) -> &[FilterStep] {
        &self.steps
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn push(&mut self, step: FilterStep) {
        self.steps.push(step);
    }

    /// `[ctx]filter[new]`, returning the context pointing at `new`.
    pub fn apply(&mut self, ctx: Context, filter: impl Into<String>, tag: &str) -> Context {
        let output = self.next_label(tag);
        self.steps.push(FilterStep {
            inputs: vec![ctx.input],
            filter: filter.into(),
            outputs: vec![output.clone()],
        });
        Context::new(output)
    }

    /// A step with several inputs and one output (overlay, xfade, amix, concat).
    pub fn join(&mut self, inputs: Vec<Context>, filter: impl Into<String>, tag: &str) -> Context {
        let output = self.next_label(tag);
        self.steps.push(FilterStep {
            inputs: inputs.into_iter().map(|ctx| ctx.input).collect(),
            filter: filter.into(),
            outputs: vec![output.clone()],
        });
        Context::new(output)
    }

    /// A source filter with no inputs (color, anullsrc).
    pub fn source(&mut self, filter: impl Into<String>, tag: &str) -> Context {
        self.join(Vec::new(), filter, tag)
    }

    /// A step declaring one output per tag, e.g. `concat=n=1:v=1:a=1[v][a]`.
    pub fn join_outputs(&mut self, inputs: Vec<Context>, filter: impl Into<String>, tags: &[&str]) -> Vec<Context> {
        let outputs: Vec<String> = tags.iter().map(|tag| self.next_label(tag)).collect();
        self.steps.push(FilterStep {
            inputs: inputs.into_iter().map(|ctx| ctx.input).collect(),
            filter: filter.into(),
            outputs: outputs.clone(),
        });
        outputs.into_iter().map(Context::new).collect()
    }

    /// Fan one stream out into `n` fresh labels.
    pub fn split(&mut self, ctx: Context, n: usize) -> Vec<Context> {
        let filter = if n == 2 {
            "split".to_string()
        } else {
            format!("split={}", n)
        };
        let tags = vec!["split"; n];
        self.join_outputs(vec![ctx], filter, &tags)
    }

    pub fn render(&self) -> String {
        self.steps
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(";")
    }

    /// Check the single-producer, produced-before-consumed and consume-once rules.
    /// Input specifiers are exempt but must refer to one of `input_count` inputs.
    pub fn validate(&self, input_count: usize) -> EngineResult<()> {
        let mut producers: HashMap<&str, usize> = HashMap::new();
        for (index, step) in self.steps.iter().enumerate() {
            for output in &step.outputs {
                if is_input_specifier(output) {
                    return Err(EngineError::invalid_graph(format!(
                        "step {} declares input specifier '{}' as an output",
                        index, output
                    )));
                }
                if producers.insert(output.as_str(), index).is_some() {
                    return Err(EngineError::invalid_graph(format!(
                        "label '{}' is produced more than once",
                        output
                    )));
                }
            }
        }

        let mut consumed: HashMap<&str, usize> = HashMap::new();
        for (index, step) in self.steps.iter().enumerate() {
            for input in &step.inputs {
                if let Some(input_idx) = input_index(input) {
                    if input_idx >= input_count {
                        return Err(EngineError::invalid_graph(format!(
                            "step {} reads input {} but only {} inputs exist",
                            index, input_idx, input_count
                        )));
                    }
                    continue;
                }
                match producers.get(input.as_str()) {
                    Some(&producer) if producer < index => {}
                    Some(_) => {
                        return Err(EngineError::invalid_graph(format!(
                            "label '{}' is consumed at step {} before it is produced",
                            input, index
                        )))
                    }
                    None => {
                        return Err(EngineError::invalid_graph(format!(
                            "label '{}' is consumed but never produced",
                            input
                        )))
                    }
                }
                let uses = consumed.entry(input.as_str()).or_insert(0);
                *uses += 1;
                if *uses > 1 {
                    return Err(EngineError::invalid_graph(format!(
                        "label '{}' is consumed more than once without a split",
                        input
                    )));
                }
            }
        }
        Ok(())
    }

    /// Labels renumbered by first appearance, so two compilations of the same input compare equal.
    pub fn canonical(&self) -> Vec<String> {
        fn rename<'a>(label: &'a str, names: &mut HashMap<&'a str, String>) -> String {
            if is_input_specifier(label) {
                return format!("[{}]", label);
            }
            let next = names.len();
            let name = names.entry(label).or_insert_with(|| format!("l{}", next));
            format!("[{}]", name)
        }

        let mut names: HashMap<&str, String> = HashMap::new();
        self.steps
            .iter()
            .map(|step| {
                let inputs: String = step.inputs.iter().map(|l| rename(l, &mut names)).collect();
                let outputs: String = step.outputs.iter().map(|l| rename(l, &mut names)).collect();
                format!("{}{}{}", inputs, step.filter, outputs)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn num_strips_trailing_zeros() {
        assert_eq!(num(4.0), "4");
        assert_eq!(num(0.5), "0.5");
        assert_eq!(num(1.25), "1.25");
        assert_eq!(num(-0.0), "0");
        assert_eq!(num(2.0000001), "2");
        assert_eq!(num(-12.5), "-12.5");
    }

    #[test]
    fn input_specifiers_are_recognised() {
        assert!(is_input_specifier("0"));
        assert!(is_input_specifier("3:v"));
        assert!(is_input_specifier("12:a"));
        assert!(!is_input_specifier("v0"));
        assert!(!is_input_specifier("0:s"));
        assert!(!is_input_specifier("split3"));
    }

    #[test]
    fn apply_threads_context() {
        let mut graph = FilterGraph::new();
        let ctx = Context::from_input(0, 'v');
        let ctx = graph.apply(ctx, "scale=100:50", "v");
        let ctx = graph.apply(ctx, "format=rgba", "v");
        assert_eq!(ctx.input(), "v1");
        assert_eq!(graph.render(), "[0:v]scale=100:50[v0];[v0]format=rgba[v1]");
        graph.validate(1).unwrap();
    }

    #[test]
    fn split_declares_fresh_outputs() {
        let mut graph = FilterGraph::new();
        let parts = graph.split(Context::from_input(0, 'v'), 2);
        assert_eq!(parts.len(), 2);
        let mut rest = parts.into_iter();
        let a = rest.next().unwrap();
        let b = rest.next().unwrap();
        graph.apply(a, "trim=0:4", "trim");
        graph.apply(b, "trim=4:5", "trim");
        assert_eq!(
            graph.render(),
            "[0:v]split[split0][split1];[split0]trim=0:4[trim2];[split1]trim=4:5[trim3]"
        );
        graph.validate(1).unwrap();
    }

    #[test]
    fn validate_rejects_double_consumption() {
        let mut graph = FilterGraph::new();
        let ctx = graph.apply(Context::from_input(0, 'v'), "null", "v");
        graph.apply(ctx.clone(), "null", "v");
        graph.apply(ctx, "null", "v");
        assert!(matches!(
            graph.validate(1),
            Err(EngineError::InvalidGraph(_))
        ));
    }

    #[test]
    fn validate_rejects_unknown_and_out_of_range_inputs() {
        let mut graph = FilterGraph::new();
        graph.apply(Context::new("ghost"), "null", "v");
        assert!(graph.validate(1).is_err());

        let mut graph = FilterGraph::new();
        graph.apply(Context::from_input(2, 'a'), "anull", "a");
        assert!(graph.validate(2).is_err());
        assert!(graph.validate(3).is_ok());
    }

    #[test]
    fn validate_rejects_duplicate_producers() {
        let mut graph = FilterGraph::new();
        graph.push(FilterStep {
            inputs: vec!["0:v".into()],
            filter: "null".into(),
            outputs: vec!["x".into()],
        });
        graph.push(FilterStep {
            inputs: vec!["1:v".into()],
            filter: "null".into(),
            outputs: vec!["x".into()],
        });
        assert!(graph.validate(2).is_err());
    }

    #[test]
    fn canonical_ignores_label_numbering() {
        let mut a = FilterGraph::new();
        a.next_label("pad");
        let ctx = a.apply(Context::from_input(0, 'v'), "null", "v");
        a.apply(ctx, "format=yuv420p", "out");

        let mut b = FilterGraph::new();
        let ctx = b.apply(Context::from_input(0, 'v'), "null", "x");
        b.apply(ctx, "format=yuv420p", "y");

        assert_ne!(a.render(), b.render());
        assert_eq!(a.canonical(), b.canonical());
    }
}
