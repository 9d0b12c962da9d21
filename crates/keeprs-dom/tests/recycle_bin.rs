use keeprs_dom::helpers;
use keeprs_dom::{Credentials, Database, DatabaseConfig, DomDatabase, Entry, Error, Group, Icon};
use uuid::Uuid;

fn disabled() -> DomDatabase {
    DomDatabase::with_config(DatabaseConfig {
        recycle_bin_enabled: false,
        ..DatabaseConfig::default()
    })
}

#[test]
fn lookup_creates_bin_once() {
    let db = DomDatabase::new();
    assert_eq!(db.recycle_bin_uuid(), Some(Uuid::nil()));

    let first = db.recycle_bin().unwrap();
    let second = db.recycle_bin().unwrap();
    assert_eq!(first.uuid(), second.uuid());
    assert_eq!(first, second);
    assert_eq!(first.parent(), Some(db.root_group()));
    assert_eq!(first.name(), "Recycle Bin");
    assert_eq!(first.icon().index(), 43);
    assert!(first.is_recycle_bin());
    assert_eq!(db.root_group().groups().len(), 1);
    assert_eq!(db.recycle_bin_uuid(), first.uuid());
    assert!(db.is_dirty());
}

#[test]
fn disabling_keeps_existing_bin() {
    let db = DomDatabase::new();
    let bin = db.recycle_bin().unwrap();

    db.enable_recycle_bin(false);
    assert!(!db.is_recycle_bin_enabled());
    assert_eq!(db.recycle_bin(), Some(bin.clone()));
    assert_eq!(db.recycle_bin(), Some(bin));
    assert_eq!(db.root_group().groups().len(), 1);
}

#[test]
fn disabled_lookup_creates_nothing() {
    let db = disabled();
    assert!(db.recycle_bin().is_none());
    assert!(db.root_group().groups().is_empty());
    assert!(!db.is_dirty());
}

#[test]
fn stale_reference_is_replaced() {
    let db = DomDatabase::new();
    let stale = Uuid::new_v4();
    db.set_recycle_bin_uuid(stale);

    let bin = db.recycle_bin().unwrap();
    assert_ne!(bin.uuid(), Some(stale));
    assert_eq!(db.recycle_bin_uuid(), bin.uuid());
    assert_eq!(db.recycle_bin(), Some(bin));
}

#[test]
fn stale_reference_with_bin_disabled_is_none() {
    let db = disabled();
    db.set_recycle_bin_uuid(Uuid::new_v4());
    assert!(db.recycle_bin().is_none());
    assert!(db.root_group().groups().is_empty());
}

fn nested_bin_db() -> DomDatabase {
    let xml = format!(
        r#"<KeePassFile>
	<Meta>
		<RecycleBinEnabled>True</RecycleBinEnabled>
		<RecycleBinUUID>{bin}</RecycleBinUUID>
	</Meta>
	<Root>
		<Group>
			<Name>Root</Name>
			<Group>
				<Name>Archive</Name>
				<Group>
					<UUID>{bin}</UUID>
					<Name>Old Bin</Name>
				</Group>
			</Group>
		</Group>
	</Root>
</KeePassFile>"#,
        bin = helpers::base64_from_uuid(Uuid::from_u128(7)),
    );
    DomDatabase::load(&Credentials::default(), &mut xml.as_bytes()).unwrap()
}

#[test]
fn nested_bin_is_found() {
    let db = nested_bin_db();
    let bin = db.recycle_bin().unwrap();
    assert_eq!(bin.name(), "Old Bin");
    assert_eq!(bin.path(), "Root/Archive/Old Bin");
    assert!(!db.is_dirty());
}

#[test]
fn deleting_group_holding_bin_removes_it() {
    let db = nested_bin_db();
    let archive = db.root_group().groups().remove(0);
    let old_bin = db.recycle_bin().unwrap();

    db.delete_group(&archive).unwrap();
    assert!(archive.parent().is_none());
    assert!(db.root_group().groups().is_empty());
    assert_eq!(old_bin.parent(), Some(archive));

    let bin = db.recycle_bin().unwrap();
    assert_ne!(bin.uuid(), old_bin.uuid());
    assert_eq!(bin.parent(), Some(db.root_group()));
}

#[test]
fn delete_entry_moves_to_bin_then_purges() {
    let db = DomDatabase::new();
    let entry = db.new_entry();
    entry.set_title("Doomed");
    db.root_group().add_entry(&entry).unwrap();

    db.delete_entry(&entry).unwrap();
    let bin = db.recycle_bin().unwrap();
    assert_eq!(entry.parent(), Some(bin.clone()));
    assert!(db.root_group().entries().is_empty());

    db.delete_entry(&entry).unwrap();
    assert!(bin.entries().is_empty());
    assert!(entry.parent().is_none());
}

#[test]
fn delete_with_bin_disabled_removes_permanently() {
    let db = disabled();
    let group = db.new_group();
    db.root_group().add_group(&group).unwrap();

    db.delete_group(&group).unwrap();
    assert!(db.root_group().groups().is_empty());
    assert!(db.recycle_bin().is_none());
}

#[test]
fn delete_group_moves_to_bin_and_root_is_protected() {
    let db = DomDatabase::new();
    let group = db.new_group();
    group.set_name("Old");
    db.root_group().add_group(&group).unwrap();

    db.delete_group(&group).unwrap();
    let bin = db.recycle_bin().unwrap();
    assert_eq!(group.parent(), Some(bin.clone()));

    assert!(matches!(
        db.delete_group(&db.root_group()),
        Err(Error::Hierarchy(_))
    ));

    db.delete_group(&bin).unwrap();
    assert!(db.root_group().groups().is_empty());
}

#[test]
fn empty_bin_purges_contents() {
    let db = DomDatabase::new();
    let entry = db.new_entry();
    let group = db.new_group();
    db.root_group().add_entry(&entry).unwrap();
    db.root_group().add_group(&group).unwrap();
    db.delete_entry(&entry).unwrap();
    db.delete_group(&group).unwrap();

    let bin = db.recycle_bin().unwrap();
    assert_eq!(bin.entries().len(), 1);
    assert_eq!(bin.groups().len(), 1);

    db.empty_recycle_bin();
    assert!(bin.entries().is_empty());
    assert!(bin.groups().is_empty());
    assert_eq!(db.recycle_bin(), Some(bin));
}
