use ahash::AHashMap;

/// Finds every nontrivial strongly connected component (and every self-loop) in
/// `nodes`/`edges` using Tarjan's algorithm, run iteratively so pathological
/// reference graphs can't blow the stack.
///
/// Returns one `Vec<String>` per offending component, each listing its members.
pub(crate) fn find_cycles(nodes: &[String], edges: &AHashMap<String, Vec<String>>) -> Vec<Vec<String>> {
    let index_of: AHashMap<&str, usize> = nodes
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();
    let adjacency: Vec<Vec<usize>> = nodes
        .iter()
        .map(|name| {
            edges
                .get(name)
                .into_iter()
                .flatten()
                .filter_map(|target| index_of.get(target.as_str()).copied())
                .collect()
        })
        .collect();

    let n = nodes.len();
    let mut index: Vec<Option<usize>> = vec![None; n];
    let mut lowlink = vec![0usize; n];
    let mut on_stack = vec![false; n];
    let mut stack = Vec::new();
    let mut counter = 0usize;
    let mut components: Vec<Vec<usize>> = Vec::new();

    for start in 0..n {
        if index[start].is_some() {
            continue;
        }
        // `work` simulates the call stack of the recursive formulation: each frame
        // is (node, index of the next neighbor to visit).
        let mut work: Vec<(usize, usize)> = vec![(start, 0)];
        index[start] = Some(counter);
        lowlink[start] = counter;
        counter += 1;
        stack.push(start);
        on_stack[start] = true;

        while let Some(&mut (v, ref mut cursor)) = work.last_mut() {
            if *cursor < adjacency[v].len() {
                let w = adjacency[v][*cursor];
                *cursor += 1;
                if index[w].is_none() {
                    index[w] = Some(counter);
                    lowlink[w] = counter;
                    counter += 1;
                    stack.push(w);
                    on_stack[w] = true;
                    work.push((w, 0));
                } else if on_stack[w] {
                    lowlink[v] = lowlink[v].min(index[w].expect("just checked Some"));
                }
            } else {
                work.pop();
                if let Some(&(parent, _)) = work.last() {
                    lowlink[parent] = lowlink[parent].min(lowlink[v]);
                }
                if lowlink[v] == index[v].expect("visited node always has an index") {
                    let mut component = Vec::new();
                    loop {
                        let w = stack.pop().expect("v is still on the stack");
                        on_stack[w] = false;
                        component.push(w);
                        if w == v {
                            break;
                        }
                    }
                    let is_cycle = component.len() > 1 || adjacency[v].contains(&v);
                    if is_cycle {
                        components.push(component);
                    }
                }
            }
        }
    }

    components
        .into_iter()
        .map(|component| component.into_iter().map(|i| nodes[i].clone()).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::find_cycles;
    use ahash::AHashMap;

    fn graph(pairs: &[(&str, &[&str])]) -> (Vec<String>, AHashMap<String, Vec<String>>) {
        let nodes: Vec<String> = pairs.iter().map(|(n, _)| (*n).to_string()).collect();
        let edges = pairs
            .iter()
            .map(|(n, targets)| {
                (
                    (*n).to_string(),
                    targets.iter().map(|t| (*t).to_string()).collect(),
                )
            })
            .collect();
        (nodes, edges)
    }

    #[test]
    fn acyclic_graph_has_no_cycles() {
        let (nodes, edges) = graph(&[("#", &["#/$defs/A"]), ("#/$defs/A", &[])]);
        assert!(find_cycles(&nodes, &edges).is_empty());
    }

    #[test]
    fn self_loop_is_a_cycle() {
        let (nodes, edges) = graph(&[("#/$defs/A", &["#/$defs/A"])]);
        let cycles = find_cycles(&nodes, &edges);
        assert_eq!(cycles, vec![vec!["#/$defs/A".to_string()]]);
    }

    #[test]
    fn mutual_reference_is_a_cycle() {
        let (nodes, edges) = graph(&[
            ("#/$defs/A", &["#/$defs/B"]),
            ("#/$defs/B", &["#/$defs/A"]),
        ]);
        let mut cycles = find_cycles(&nodes, &edges);
        assert_eq!(cycles.len(), 1);
        cycles[0].sort();
        assert_eq!(
            cycles[0],
            vec!["#/$defs/A".to_string(), "#/$defs/B".to_string()]
        );
    }

    #[test]
    fn diamond_without_back_edge_is_acyclic() {
        let (nodes, edges) = graph(&[
            ("#", &["#/$defs/A", "#/$defs/B"]),
            ("#/$defs/A", &["#/$defs/Shared"]),
            ("#/$defs/B", &["#/$defs/Shared"]),
            ("#/$defs/Shared", &[]),
        ]);
        assert!(find_cycles(&nodes, &edges).is_empty());
    }
}
