use super::Resolver;
use crate::diagnostics::Diagnostic;

impl Resolver<'_> {
    pub(super) fn resolve_record(&mut self, name: &str) {
        let Some(record) = self.loader.record_mut(name) else {
            return;
        };
        let fields = &record.fields;
        let Some(components) = record.record_components.as_mut() else {
            return;
        };

        let mut crowded = Vec::new();
        for component in components.iter_mut() {
            let Some(field) = fields.get(&component.field) else {
                continue;
            };
            component.accessor = field.accessors.first().map(|accessor| accessor.name.clone());
            if field.accessors.len() > 1 {
                crowded.push(Diagnostic::UnexpectedRecordAccessorCount {
                    class: name.to_string(),
                    field: component.field.clone(),
                    accessors: field
                        .accessors
                        .iter()
                        .map(|accessor| accessor.name.clone())
                        .collect(),
                });
            }
        }

        for diagnostic in crowded {
            self.report(diagnostic);
        }
    }
}
