use std::fs;
use std::path::Path;

use sysvol_control::{
    DirectoryEnumerator, DirectoryObjectRef, FsOwnerExtractor, GpoOwnerCollector, Result,
    SysvolConfig, TsvEdgeWriter,
};
use tempfile::TempDir;

const DEFAULT_DOMAIN_POLICY: &str = "{31B2F340-016D-11D2-945F-00C04FB984F9}";
const DEFAULT_DC_POLICY: &str = "{6AC1786C-016F-11D2-945F-00C04FB984F9}";

fn gpo_dn(cn: &str) -> String {
    format!("CN={},CN=Policies,CN=System,DC=corp,DC=local", cn)
}

/// Directory stand-in returning a fixed list of (dn, cn) pairs
struct StaticDirectory {
    objects: Vec<(String, String)>,
}

impl StaticDirectory {
    fn with_gpos(cns: &[&str]) -> Self {
        Self {
            objects: cns.iter().map(|cn| (gpo_dn(cn), cn.to_string())).collect(),
        }
    }
}

impl DirectoryEnumerator for StaticDirectory {
    fn for_each_object(
        &mut self,
        _filter: &str,
        _short_name_attr: &str,
        callback: &mut dyn FnMut(DirectoryObjectRef<'_>),
    ) -> Result<u64> {
        for (dn, cn) in &self.objects {
            callback(DirectoryObjectRef::new(dn, cn));
        }
        Ok(self.objects.len() as u64)
    }
}

fn create_gpo_folders(policies: &Path, cn: &str) {
    let gpo = policies.join(cn);
    fs::create_dir_all(gpo.join("User")).unwrap();
    fs::create_dir_all(gpo.join("Machine")).unwrap();
}

fn policies_dir() -> TempDir {
    let dir = TempDir::new().unwrap();
    fs::create_dir(dir.path().join("Policies")).unwrap();
    dir
}

fn run_collection(policies: &Path, directory: &mut StaticDirectory) -> String {
    let config = SysvolConfig::new(policies.to_str().unwrap());
    let extractor = FsOwnerExtractor::new(false);
    let mut sink = TsvEdgeWriter::with_header(Vec::new()).unwrap();

    let mut collector = GpoOwnerCollector::new(&config, &extractor, &mut sink);
    directory
        .for_each_object("(objectClass=groupPolicyContainer)", "cn", &mut |object: DirectoryObjectRef<'_>| {
            collector.process(object);
        })
        .unwrap();
    drop(collector);

    String::from_utf8(sink.finish().unwrap()).unwrap()
}

fn records(output: &str) -> Vec<Vec<String>> {
    output
        .lines()
        .skip(1)
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect()
}

#[test]
fn three_edges_per_complete_gpo() {
    let dir = policies_dir();
    let policies = dir.path().join("Policies");
    create_gpo_folders(&policies, DEFAULT_DOMAIN_POLICY);

    let output = run_collection(&policies, &mut StaticDirectory::with_gpos(&[DEFAULT_DOMAIN_POLICY]));
    assert!(output.starts_with("relation\towner\tsubject\n"));

    let records = records(&output);
    assert_eq!(records.len(), 3);

    let dn = gpo_dn(DEFAULT_DOMAIN_POLICY);
    let subjects: Vec<&str> = records.iter().map(|r| r[2].as_str()).collect();
    assert_eq!(
        subjects,
        vec![dn.clone(), format!("CN=User,{}", dn), format!("CN=Machine,{}", dn)]
    );
    assert!(records.iter().all(|r| r[0] == "SYSVOL_OWNER"));
}

#[cfg(unix)]
#[test]
fn unix_owner_is_rendered_as_uid_sid() {
    use std::os::unix::fs::MetadataExt;

    let dir = policies_dir();
    let policies = dir.path().join("Policies");
    create_gpo_folders(&policies, DEFAULT_DOMAIN_POLICY);
    let uid = fs::metadata(policies.join(DEFAULT_DOMAIN_POLICY)).unwrap().uid();

    let output = run_collection(&policies, &mut StaticDirectory::with_gpos(&[DEFAULT_DOMAIN_POLICY]));
    for record in records(&output) {
        assert_eq!(record[1], format!("S-1-22-1-{}", uid));
    }
}

#[test]
fn missing_sub_folder_skips_only_that_edge() {
    let dir = policies_dir();
    let policies = dir.path().join("Policies");
    fs::create_dir_all(policies.join(DEFAULT_DC_POLICY).join("Machine")).unwrap();

    let output = run_collection(&policies, &mut StaticDirectory::with_gpos(&[DEFAULT_DC_POLICY]));
    let dn = gpo_dn(DEFAULT_DC_POLICY);
    let subjects: Vec<String> = records(&output).into_iter().map(|r| r[2].clone()).collect();
    assert_eq!(subjects, vec![dn.clone(), format!("CN=Machine,{}", dn)]);
}

#[test]
fn missing_gpo_folder_yields_no_edges_and_continues() {
    let dir = policies_dir();
    let policies = dir.path().join("Policies");
    create_gpo_folders(&policies, DEFAULT_DC_POLICY);

    let mut directory = StaticDirectory::with_gpos(&[DEFAULT_DOMAIN_POLICY, "not-a-guid", DEFAULT_DC_POLICY]);
    let output = run_collection(&policies, &mut directory);

    let records = records(&output);
    assert_eq!(records.len(), 3);
    assert!(records.iter().all(|r| r[2].ends_with(&gpo_dn(DEFAULT_DC_POLICY))));
}

#[test]
fn repeated_runs_are_byte_identical() {
    let dir = policies_dir();
    let policies = dir.path().join("Policies");
    create_gpo_folders(&policies, DEFAULT_DOMAIN_POLICY);
    create_gpo_folders(&policies, DEFAULT_DC_POLICY);

    let mut directory = StaticDirectory::with_gpos(&[DEFAULT_DOMAIN_POLICY, DEFAULT_DC_POLICY]);
    let first = run_collection(&policies, &mut directory);
    let second = run_collection(&policies, &mut directory);

    assert_eq!(first, second);
    assert_eq!(records(&first).len(), 6);
}

#[test]
fn overlong_root_rejects_every_gpo() {
    // 259 units leaves no room for "\{GUID}"
    let root = "P".repeat(259);

    let output = run_collection(Path::new(&root), &mut StaticDirectory::with_gpos(&[DEFAULT_DOMAIN_POLICY]));
    assert_eq!(output, "relation\towner\tsubject\n");
}
