use fiche_core::error::FicheError;
use fiche_core::reference::database::builtin_tables;

pub fn departments() -> Result<(), FicheError> {
    let tables = builtin_tables();
    for dep in tables.departments() {
        println!("  {:<4} {:<32} {}", dep.code, dep.name, dep.region);
    }
    println!("\n{} departments", tables.department_count());
    Ok(())
}

pub fn rubriques() -> Result<(), FicheError> {
    let tables = builtin_tables();

    println!("Processing operations:\n");
    for (operation, rubriques) in tables.operations() {
        println!("  {:<6} -> {}", operation, rubriques.join(", "));
    }

    println!("\nConsumption policies (others use balance):\n");
    for (rubrique, policy) in tables.policies() {
        println!("  {:<8} {:?}", rubrique, policy);
    }
    println!();

    Ok(())
}
