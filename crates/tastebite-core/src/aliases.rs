use diesel_async::AsyncPgConnection;
use diesel_async::pooled_connection::bb8::Pool;

pub type DieselError = diesel::result::Error;

pub type DbPool = Pool<AsyncPgConnection>;
