pub mod testrail;
