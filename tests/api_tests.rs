//! `ApiClient` against a local mock server. Every service is mounted
//! under its own prefix on the same server.

use brainlife::api::{DlDatasetQuery, InstanceQuery, NewProject, NewResource, ProjectQuery, ResourceQuery};
use brainlife::auth::{AuthRequest, LoginMethod};
use brainlife::{ApiClient, Error, Service, ServiceConfig};
use mockito::{Matcher, Mock, Server, ServerGuard};
use serde_json::json;

const TOKEN: &str = "tok";

fn client(server: &ServerGuard) -> ApiClient {
    let url = server.url();
    let services = ServiceConfig::for_host("test.brainlife.io")
        .with_service(Service::Auth, format!("{url}/auth"))
        .with_service(Service::Amaretti, format!("{url}/amaretti"))
        .with_service(Service::Warehouse, format!("{url}/warehouse"))
        .with_service(Service::Github, format!("{url}/github"));
    ApiClient::new(services).unwrap().with_token(Some(TOKEN.into()))
}

/// JSON reply to an authenticated call, whatever the query string.
fn reply(server: &mut ServerGuard, method: &str, path: &str, status: usize, body: serde_json::Value) -> Mock {
    server
        .mock(method, path)
        .match_query(Matcher::Any)
        .match_header("authorization", format!("Bearer {TOKEN}").as_str())
        .with_status(status)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create()
}

fn resource(id: &str, name: &str) -> serde_json::Value {
    json!({"_id": id, "name": name, "active": true})
}

#[test]
fn list_reads_tolerate_404() {
    let mut server = Server::new();
    let api = client(&server);
    let projects = reply(&mut server, "GET", "/warehouse/project", 404, json!({}));
    let datatypes = reply(&mut server, "GET", "/warehouse/datatype", 404, json!({}));
    let instances = reply(&mut server, "GET", "/amaretti/instance", 404, json!({}));
    let dl = reply(&mut server, "GET", "/warehouse/datalad/datasets", 404, json!({}));

    assert!(api.query_projects(&ProjectQuery::default()).unwrap().is_empty());
    assert!(api.query_datatypes(&Default::default()).unwrap().is_empty());
    assert!(api.query_instances(&InstanceQuery::default()).unwrap().is_empty());
    assert!(api.query_dl_datasets(&DlDatasetQuery::default()).unwrap().is_empty());
    for mock in [projects, datatypes, instances, dl] {
        mock.assert();
    }
}

#[test]
fn other_404s_and_4xx_are_remote_errors() {
    let mut server = Server::new();
    let api = client(&server);
    reply(&mut server, "GET", "/amaretti/task", 404, json!({}));
    reply(&mut server, "GET", "/amaretti/resource", 403, json!({"message": "you are not a member"}));

    match api.fetch_task("t1").unwrap_err() {
        Error::Remote { status, .. } => assert_eq!(status, 404),
        other => panic!("unexpected {other:?}"),
    }
    match api.query_resources(&ResourceQuery::default()).unwrap_err() {
        Error::Remote { status, message } => {
            assert_eq!(status, 403);
            assert_eq!(message, "you are not a member");
        }
        other => panic!("unexpected {other:?}"),
    }
}

#[test]
fn list_envelopes_are_unwrapped() {
    let mut server = Server::new();
    let api = client(&server);
    reply(
        &mut server,
        "GET",
        "/warehouse/project",
        200,
        json!({"projects": [{"_id": "p1", "name": "test", "group_id": 12}], "count": 1}),
    );
    let projects = api.query_projects(&ProjectQuery::default()).unwrap();
    assert_eq!(projects.len(), 1);
    assert_eq!(projects[0].group, 12);
}

#[test]
fn submitted_task_is_unwrapped_from_its_envelope() {
    let mut server = Server::new();
    let api = client(&server);
    let submit = server
        .mock("POST", "/amaretti/task")
        .match_header("authorization", "Bearer tok")
        .match_body(Matcher::PartialJson(json!({"instance_id": "i1", "service": "brainlife/app-noop"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"message": "Task created", "task": {"_id": "t1", "name": "noop", "status": "requested"}}).to_string())
        .create();
    let stage = server
        .mock("POST", "/warehouse/dataset/stage")
        .match_body(Matcher::PartialJson(json!({"instance_id": "i1", "dataset_ids": ["d1"]})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"task": {"_id": "t2", "name": "stage", "status": "requested"}}).to_string())
        .create();

    let task = api.run_task("i1", "noop", "brainlife/app-noop", json!({})).unwrap();
    assert_eq!(task.id, "t1");
    assert_eq!(task.status, "requested");
    let staged = api.stage_datasets("i1", &["d1".to_string()]).unwrap();
    assert_eq!(staged.id, "t2");
    submit.assert();
    stage.assert();
}

#[test]
fn github_calls_carry_no_token() {
    let mut server = Server::new();
    let api = client(&server);
    let repo = server
        .mock("GET", "/github/repos/brainlife/app-dipy")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"default_branch": "main"}).to_string())
        .create();
    let branch = server
        .mock("GET", "/github/repos/brainlife/app-dipy/branches/main")
        .match_header("authorization", Matcher::Missing)
        .with_status(200)
        .with_body("{}")
        .create();
    server
        .mock("GET", "/github/repos/brainlife/app-dipy/branches/nope")
        .match_header("authorization", Matcher::Missing)
        .with_status(404)
        .create();

    assert_eq!(api.validate_branch("brainlife/app-dipy", None).unwrap(), "main");
    let err = api.validate_branch("brainlife/app-dipy", Some("nope")).unwrap_err();
    assert!(matches!(err, Error::BranchNotFound { ref branch, .. } if branch == "nope"));
    repo.assert();
    branch.assert();
}

#[test]
fn login_posts_credentials_without_a_bearer() {
    let mut server = Server::new();
    let api = client(&server);
    let login = server
        .mock("POST", "/auth/local/auth")
        .match_header("authorization", Matcher::Missing)
        .match_body(Matcher::PartialJson(json!({"username": "alice", "password": "secret"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"jwt": "new.jwt.token"}).to_string())
        .create();

    let jwt = api.login(LoginMethod::Local, &AuthRequest::new("alice", "secret", 7)).unwrap();
    assert_eq!(jwt, "new.jwt.token");
    login.assert();
}

#[test]
fn project_create_and_delete() {
    let mut server = Server::new();
    let api = client(&server);
    let create = server
        .mock("POST", "/warehouse/project")
        .match_header("authorization", "Bearer tok")
        .match_body(Matcher::Json(json!({"name": "test", "desc": "scratch"})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"_id": "p1", "name": "test", "desc": "scratch", "group_id": 7}).to_string())
        .create();
    let delete = reply(&mut server, "DELETE", "/warehouse/project/p1", 200, json!({"message": "removed"}));

    let project = api
        .create_project(&NewProject {
            name: "test".into(),
            description: Some("scratch".into()),
            group: None,
        })
        .unwrap();
    assert_eq!(project.id, "p1");
    assert_eq!(project.group, 7);
    api.delete_project(&project.id).unwrap();
    create.assert();
    delete.assert();
}

#[test]
fn resource_lifecycle() {
    let mut server = Server::new();
    let api = client(&server);
    let create = server
        .mock("POST", "/amaretti/resource")
        .match_body(Matcher::PartialJson(json!({"name": "gpu", "active": true})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(resource("r1", "gpu").to_string())
        .create();
    let update = server
        .mock("PUT", "/amaretti/resource/r1")
        .match_body(Matcher::Json(json!({"name": "gpu2", "active": false})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"_id": "r1", "name": "gpu2"}).to_string())
        .create();
    let test = reply(&mut server, "PUT", "/amaretti/resource/test/r1", 200, json!({"status": "ok"}));
    let best = server
        .mock("GET", "/amaretti/resource/best")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("service".into(), "brainlife/app-noop".into()),
            Matcher::UrlEncoded("gids[]".into(), "1".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"resource": resource("r1", "gpu2"), "score": 10}).to_string())
        .create();
    let delete = reply(&mut server, "DELETE", "/amaretti/resource/r1", 200, json!({"message": "removed"}));

    let created = api
        .create_resource(&NewResource {
            name: Some("gpu".into()),
            active: true,
            ..Default::default()
        })
        .unwrap();
    assert_eq!(created.id, "r1");
    let updated = api
        .update_resource(
            "r1",
            &NewResource {
                name: Some("gpu2".into()),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(updated["name"], "gpu2");
    assert_eq!(api.test_resource("r1").unwrap(), "ok");
    let picked = api.best_resource("brainlife/app-noop", &[1]).unwrap();
    assert_eq!(picked.resource.map(|r| r.id).as_deref(), Some("r1"));
    api.delete_resource("r1").unwrap();
    for mock in [create, update, test, best, delete] {
        mock.assert();
    }
}

fn resources_named(server: &mut ServerGuard, found: serde_json::Value) -> Mock {
    server
        .mock("GET", "/amaretti/resource")
        .match_query(Matcher::UrlEncoded("find".into(), json!({"name": "gpu"}).to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"resources": found, "count": 2}).to_string())
        .create()
}

#[test]
fn resource_names_must_match_exactly() {
    let mut server = Server::new();
    let api = client(&server);
    let mock = resources_named(&mut server, json!([resource("r1", "a-gpu"), resource("r2", "gpu")]));
    assert_eq!(api.find_resource("gpu").unwrap().id, "r2");
    mock.assert();
}

#[test]
fn duplicate_resource_names_are_ambiguous() {
    let mut server = Server::new();
    let api = client(&server);
    resources_named(&mut server, json!([resource("r1", "gpu"), resource("r2", "gpu")]));
    let err = api.find_resource("gpu").unwrap_err();
    assert!(matches!(err, Error::Ambiguous { matches: 2, .. }), "{err:?}");
}

#[test]
fn near_miss_resource_name_is_not_found() {
    let mut server = Server::new();
    let api = client(&server);
    resources_named(&mut server, json!([resource("r1", "a-gpu")]));
    let err = api.find_resource("gpu").unwrap_err();
    assert!(matches!(err, Error::NotFound { .. }), "{err:?}");
}

#[test]
fn datalad_query_preview_and_import() {
    let mut server = Server::new();
    let api = client(&server);
    reply(
        &mut server,
        "GET",
        "/warehouse/datalad/datasets",
        200,
        json!([{"_id": "dl1", "path": "OpenNeuroDatasets/ds000001", "dataset_description": {"Name": "Balloon"}}]),
    );
    let item = server
        .mock("GET", "/warehouse/datalad/items")
        .match_query(Matcher::UrlEncoded("find".into(), json!({"dldataset": "dl1"}).to_string()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!([{"_id": "it1", "dataset": {"datatype": {"_id": "dt1"}, "meta": {"subject": "01"}}}]).to_string(),
        )
        .create();
    let import = server
        .mock("POST", "/warehouse/datalad/import/dl1")
        .match_body(Matcher::Json(json!({"project": "p1", "datatypes": ["dt1"]})))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"message": "importing"}).to_string())
        .create();

    let found = api.query_dl_datasets(&DlDatasetQuery::default()).unwrap();
    assert_eq!(found[0].dataset_description.name, "Balloon");
    let preview = api.dl_dataset_item("dl1").unwrap().unwrap();
    assert_eq!(preview.dataset.datatype.to_string(), "dt1");
    assert_eq!(preview.dataset.meta["subject"], "01");
    api.import_dl_dataset("dl1", "p1", &["dt1".to_string()]).unwrap();
    item.assert();
    import.assert();
}

#[test]
fn upload_pushes_raw_tarball_with_untar() {
    let mut server = Server::new();
    let api = client(&server);
    let upload = server
        .mock("POST", "/amaretti/task/upload/t1")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("p".into(), "upload/upload.tar.gz".into()),
            Matcher::UrlEncoded("untar".into(), "true".into()),
        ]))
        .match_header("authorization", "Bearer tok")
        .match_body("tarball")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("{}")
        .create();

    api.upload_to_task("t1", "upload/upload.tar.gz", b"tarball".to_vec()).unwrap();
    upload.assert();
}
