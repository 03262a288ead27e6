pub mod super_admin;
