use rocket::Route;

mod candidates;
mod elections;
mod results;
mod voters;
mod voting;

pub fn routes() -> Vec<Route> {
    let mut routes = Vec::new();
    routes.extend(elections::routes());
    routes.extend(candidates::routes());
    routes.extend(voters::routes());
    routes.extend(voting::routes());
    routes.extend(results::routes());
    routes
}
