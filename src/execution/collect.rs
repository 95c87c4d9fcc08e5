//! Field collection: flattening fragments and grouping by response key

use super::Variables;
use super::document::{OperationDocument, Selection, SelectionNode};
use super::validation::should_include;
use crate::schema::SchemaRegistry;
use indexmap::IndexMap;
use std::collections::HashSet;

/// Selection nodes sharing a response key, in first-appearance order
pub(crate) type GroupedFields<'a> = IndexMap<&'a str, Vec<&'a SelectionNode>>;

/// Collect the fields a selection set yields for a concrete object type
///
/// Inline fragments and spreads apply when their type condition names the
/// object type or an interface it implements. Selections excluded by
/// `@skip` / `@include` are dropped. Nodes with the same response key are
/// merged so their sub-selections execute together.
pub(crate) fn collect_fields<'a, I>(
    schema: &SchemaRegistry,
    document: &'a OperationDocument,
    object_type: &str,
    selections: I,
    variables: &Variables,
) -> GroupedFields<'a>
where
    I: IntoIterator<Item = &'a Selection>,
{
    let mut collector = Collector {
        schema,
        document,
        object_type,
        variables,
        grouped: IndexMap::new(),
        visited_fragments: HashSet::new(),
    };
    for selection in selections {
        collector.collect(selection);
    }
    collector.grouped
}

struct Collector<'a, 'c> {
    schema: &'c SchemaRegistry,
    document: &'a OperationDocument,
    object_type: &'c str,
    variables: &'c Variables,
    grouped: GroupedFields<'a>,
    visited_fragments: HashSet<&'a str>,
}

impl<'a> Collector<'a, '_> {
    fn collect(&mut self, selection: &'a Selection) {
        if !should_include(selection.directives(), self.variables) {
            return;
        }
        match selection {
            Selection::Field(node) => {
                self.grouped.entry(node.response_key()).or_default().push(node);
            }
            Selection::InlineFragment(inline) => {
                if self.applies(inline.type_condition.as_deref()) {
                    for child in &inline.selections {
                        self.collect(child);
                    }
                }
            }
            Selection::FragmentSpread(spread) => {
                if !self.visited_fragments.insert(spread.name.as_str()) {
                    return;
                }
                let Some(fragment) = self.document.fragments.get(&spread.name) else {
                    return;
                };
                if self.applies(Some(fragment.type_condition.as_str())) {
                    for child in &fragment.selections {
                        self.collect(child);
                    }
                }
            }
        }
    }

    fn applies(&self, type_condition: Option<&str>) -> bool {
        match type_condition {
            None => true,
            Some(condition) => self.schema.is_possible_type(condition, self.object_type),
        }
    }
}
