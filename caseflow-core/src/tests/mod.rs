mod run;
mod support;
