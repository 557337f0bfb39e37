use std::sync::Arc;
use std::thread;

use basin3d_catalog::{Catalog, CatalogArgs, Error};
use basin3d_id::IdPrefix;
use basin3d_plugin::{CsvPlugin, PluginHandle, PluginMetadata, TableSource};

fn plugin(id: &str, prefix: &str, variables: usize) -> Arc<dyn PluginHandle> {
    let mut mapping =
        String::from("basin3d_id,datasource_name,description,sampling_medium,categories\n");
    for i in 0..variables {
        mapping.push_str(&format!("V{i},{id}_{i},Variable {i},WATER,Test\n"));
    }
    let metadata = PluginMetadata::new(id, IdPrefix::new(prefix).unwrap(), "https://example");
    Arc::new(CsvPlugin::new(metadata).with_mapping(TableSource::inline(id, mapping)))
}

#[test]
fn readers_run_alongside_initialize() {
    let catalog = Arc::new(Catalog::new_in_memory(CatalogArgs::default()));
    catalog.initialize(&[plugin("Alpha", "A", 50)]).unwrap();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let catalog = Arc::clone(&catalog);
            thread::spawn(move || {
                for _ in 0..20 {
                    // the second pass only adds rows, so counts never drop
                    let seen = catalog
                        .find_observed_properties(Some("Alpha"), None)
                        .unwrap()
                        .count();
                    assert!(seen >= 50);
                    let found = catalog
                        .find_observed_property_variable("Alpha", "A-V7", true)
                        .unwrap();
                    assert_eq!(Some("V7".to_string()), found.map(|v| v.basin3d_id));
                }
            })
        })
        .collect();

    let writer = {
        let catalog = Arc::clone(&catalog);
        thread::spawn(move || {
            catalog
                .initialize(&[plugin("Alpha", "A", 80), plugin("Beta", "B", 30)])
                .unwrap()
        })
    };

    for reader in readers {
        reader.join().unwrap();
    }
    let report = writer.join().unwrap();
    assert_eq!(110, report.rows_applied);

    assert_eq!(
        80,
        catalog
            .find_observed_property_variables(None, None, true)
            .unwrap()
            .count()
    );
    assert_eq!(
        30,
        catalog
            .find_observed_properties(Some("Beta"), None)
            .unwrap()
            .count()
    );
}

#[test]
fn reads_fail_until_a_datasource_exists() {
    let catalog = Catalog::new_in_memory(CatalogArgs::default());
    let report = catalog.initialize(&[]).unwrap();
    assert_eq!(0, report.plugins_loaded);
    assert!(matches!(
        catalog.find_observed_properties(None, None),
        Err(Error::CatalogNotInitialized)
    ));
}
