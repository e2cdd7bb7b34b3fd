use crate::discovery::ResolvedScope;
use crate::types::NamespaceReport;

use comfy_table::{presets::NOTHING, Attribute, Cell, Color, Table};
use std::fmt::Display;

pub struct Pretty {
    identity: String,
    scope: ResolvedScope,
    rows: Vec<Vec<String>>,
}

impl Pretty {
    pub fn new(identity: String, scope: ResolvedScope) -> Self {
        Self {
            identity,
            scope,
            rows: Vec::new(),
        }
    }

    fn display_namespace(&self) -> bool {
        self.scope == ResolvedScope::AllNamespaces
    }

    pub fn push(&mut self, report: &NamespaceReport) {
        let namespace = report.namespace.clone().unwrap_or_default();
        for row in report.matrix.rows() {
            let mut cells = Vec::with_capacity(3);
            if self.display_namespace() {
                cells.push(namespace.clone());
            }
            cells.push(row.resource.to_string());
            cells.push(super::verb_list(row.verbs));
            self.rows.push(cells);
        }
    }
}

impl Display for Pretty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{}", super::heading(&self.identity, &self.scope))?;

        let mut table = Table::new();
        table.load_preset(NOTHING);

        let mut titles = Vec::with_capacity(3);
        if self.display_namespace() {
            titles.push(Cell::new("Namespace").add_attribute(Attribute::Bold));
        }
        titles.push(Cell::new("Resource").add_attribute(Attribute::Bold));
        titles.push(Cell::new("Verbs").add_attribute(Attribute::Bold));
        table.set_header(titles);

        self.rows.iter().for_each(|cells| {
            let last = cells.len() - 1;
            let row = cells
                .iter()
                .enumerate()
                .map(|(i, text)| {
                    if i == last {
                        Cell::new(text).fg(Color::Green)
                    } else {
                        Cell::new(text)
                    }
                })
                .collect::<Vec<Cell>>();
            table.add_row(row);
        });

        table.fmt(f)
    }
}
