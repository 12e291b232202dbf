use crate::parsers::ClassMap;

/// Copy fields declared on discovered base classes into each model.
///
/// Single pass in map order: a base's fields are taken as they stand when its
/// subclass is visited, so a grandparent's fields only reach a grandchild if
/// the parent was visited first. Returns the number of fields copied.
pub fn propagate_fields(models: &mut ClassMap) -> usize {
    let mut copied = 0;

    for index in 0..models.len() {
        let dependencies = match models.get_index(index) {
            Some((_, model)) => model.class_dependencies.clone(),
            None => continue,
        };

        for dep in &dependencies {
            let inherited = match models.get(dep.as_str()) {
                Some(base) => base.fields.clone(),
                None => continue,
            };

            if let Some((_, model)) = models.get_index_mut(index) {
                copied += inherited.len();
                model.fields.extend(inherited);
            }
        }
    }

    copied
}
