//! Built-in sample programs.
//!
//! Each demo is a typed [`Program`] assembled with [`ProgramBuilder`], ready
//! for the code generator. The CLI runs them by name.

use crate::lang::{BinaryOp, Expression, FunctionDecl, Program, ProgramBuilder, Statement, Type};

#[derive(Clone, Copy)]
pub struct Demo {
    pub name: &'static str,
    pub description: &'static str,
    pub build: fn() -> Program,
}

impl std::fmt::Debug for Demo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Demo").field("name", &self.name).finish()
    }
}

const DEMOS: &[Demo] = &[
    Demo {
        name: "hello",
        description: "assign 5 to a local and write it",
        build: hello,
    },
    Demo {
        name: "loop",
        description: "count from 0 to 2 in a while loop",
        build: counting_loop,
    },
    Demo {
        name: "add",
        description: "call add(2, 3) and write the result",
        build: add,
    },
    Demo {
        name: "array",
        description: "set one array element and read two back",
        build: array,
    },
    Demo {
        name: "echo",
        description: "echo input characters until 'q'",
        build: echo,
    },
    Demo {
        name: "tictactoe",
        description: "two-player tic-tac-toe, cells 0-8",
        build: tictactoe,
    },
];

pub fn all() -> &'static [Demo] {
    DEMOS
}

pub fn find(name: &str) -> Option<Demo> {
    all().iter().find(|demo| demo.name == name).copied()
}

fn hello() -> Program {
    let mut b = ProgramBuilder::new();
    let x = b.variable("x", Type::Integer);

    b.add_function(FunctionDecl::new("main").local(&x).statements([
        Statement::expr(Expression::assign(&x, Expression::int(5))),
        Statement::expr(Expression::write(vec![Expression::var(&x)])),
    ]));
    b.finish()
}

fn counting_loop() -> Program {
    let mut b = ProgramBuilder::new();
    let counter = b.variable("counter", Type::Integer);

    b.add_function(FunctionDecl::new("main").local(&counter).statements([
        Statement::expr(Expression::assign(&counter, Expression::int(0))),
        Statement::while_(
            Expression::binary(BinaryOp::LesserThan, Expression::var(&counter), Expression::int(3)),
            vec![
                Statement::expr(Expression::write(vec![Expression::var(&counter)])),
                Statement::expr(Expression::assign(
                    &counter,
                    Expression::binary(BinaryOp::Plus, Expression::var(&counter), Expression::int(1)),
                )),
                Statement::Continue,
            ],
        ),
    ]));
    b.finish()
}

fn add() -> Program {
    let mut b = ProgramBuilder::new();
    let lhs = b.variable("a", Type::Integer);
    let rhs = b.variable("b", Type::Integer);

    b.add_function(FunctionDecl::new("add").param(&lhs).param(&rhs).statement(
        Statement::ret(Some(Expression::binary(
            BinaryOp::Plus,
            Expression::var(&lhs),
            Expression::var(&rhs),
        ))),
    ));
    b.add_function(FunctionDecl::new("main").statement(Statement::expr(Expression::write(
        vec![Expression::call("add", vec![Expression::int(2), Expression::int(3)])],
    ))));
    b.finish()
}

fn array() -> Program {
    let mut b = ProgramBuilder::new();
    let arr = b.variable("arr", Type::Array);

    b.add_function(FunctionDecl::new("main").local(&arr).statements([
        Statement::expr(Expression::array_set(
            &arr,
            Expression::int(0),
            Expression::string("a"),
        )),
        Statement::expr(Expression::write(vec![
            Expression::array_get(&arr, Expression::int(1)),
            Expression::string(" "),
            Expression::array_get(&arr, Expression::int(0)),
            Expression::string(" "),
            Expression::var(&arr),
        ])),
    ]));
    b.finish()
}

fn echo() -> Program {
    let mut b = ProgramBuilder::new();
    let c = b.variable("c", Type::String);

    b.add_function(FunctionDecl::new("main").local(&c).statements([
        Statement::expr(Expression::assign(&c, Expression::read())),
        Statement::while_(
            Expression::binary(BinaryOp::NotEquals, Expression::var(&c), Expression::string("q")),
            vec![
                Statement::expr(Expression::write(vec![Expression::var(&c)])),
                Statement::expr(Expression::assign(&c, Expression::read())),
            ],
        ),
    ]));
    b.finish()
}

fn eq(lhs: Expression, rhs: Expression) -> Expression {
    Expression::binary(BinaryOp::Equals, lhs, rhs)
}

fn ne(lhs: Expression, rhs: Expression) -> Expression {
    Expression::binary(BinaryOp::NotEquals, lhs, rhs)
}

fn write(args: Vec<Expression>) -> Statement {
    Statement::expr(Expression::write(args))
}

fn call(function: &str, args: Vec<Expression>) -> Statement {
    Statement::expr(Expression::call(function, args))
}

/// Board lines that win, as cell triples.
const LINES: [[i64; 3]; 8] = [
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    [0, 4, 8],
    [2, 4, 6],
];

fn tictactoe() -> Program {
    let mut b = ProgramBuilder::new();
    let board = b.global("board", Type::Array);
    let turn = b.global("turn", Type::String);

    let cell = |index: Expression| Expression::array_get(&board, index);
    let blank = || Expression::string(" ");

    // reset(): clear all nine cells, X starts
    let i = b.variable("i", Type::Integer);
    b.add_function(FunctionDecl::new("reset").local(&i).statements([
        Statement::expr(Expression::assign(&i, Expression::int(0))),
        Statement::while_(
            Expression::binary(BinaryOp::LesserThan, Expression::var(&i), Expression::int(9)),
            vec![
                Statement::expr(Expression::array_set(&board, Expression::var(&i), blank())),
                Statement::expr(Expression::assign(
                    &i,
                    Expression::binary(BinaryOp::Plus, Expression::var(&i), Expression::int(1)),
                )),
            ],
        ),
        Statement::expr(Expression::assign(&turn, Expression::string("X"))),
    ]));

    // print_row(x, y, z)
    let x = b.variable("x", Type::Integer);
    let y = b.variable("y", Type::Integer);
    let z = b.variable("z", Type::Integer);
    b.add_function(FunctionDecl::new("print_row").param(&x).param(&y).param(&z).statements([
        write(vec![
            cell(Expression::var(&x)),
            Expression::string(" | "),
            cell(Expression::var(&y)),
            Expression::string(" | "),
            cell(Expression::var(&z)),
            Expression::string("\n"),
        ]),
        write(vec![Expression::string("\n")]),
    ]));

    b.add_function(FunctionDecl::new("print_board").statements((0..3).map(|row| {
        call(
            "print_row",
            (0..3).map(|col| Expression::int(row * 3 + col)).collect(),
        )
    })));

    // get_input(prompt): read until a cell number is typed
    let prompt = b.variable("prompt", Type::String);
    let key = b.variable("key", Type::String);
    let mut body = vec![
        write(vec![Expression::var(&prompt)]),
        Statement::expr(Expression::assign(&key, Expression::read())),
        write(vec![Expression::var(&key), Expression::string("\n")]),
    ];
    body.extend((0..9).map(|n: i64| {
        Statement::if_(
            eq(Expression::var(&key), Expression::string(n.to_string())),
            vec![Statement::ret(Some(Expression::int(n)))],
        )
    }));
    body.push(write(vec![Expression::string("Not recognized\n")]));
    b.add_function(
        FunctionDecl::new("get_input")
            .param(&prompt)
            .local(&key)
            .statement(Statement::while_(Expression::boolean(true), body)),
    );

    // do_turn(current): place a mark on a free cell
    let current = b.variable("current", Type::String);
    let input = b.variable("input", Type::Integer);
    b.add_function(FunctionDecl::new("do_turn").param(&current).local(&input).statement(
        Statement::while_(
            Expression::boolean(true),
            vec![
                Statement::if_(
                    eq(Expression::var(&current), Expression::string("X")),
                    vec![write(vec![Expression::string("It's X's turn\n")])],
                ),
                Statement::if_(
                    eq(Expression::var(&current), Expression::string("O")),
                    vec![write(vec![Expression::string("It's O's turn\n")])],
                ),
                Statement::expr(Expression::assign(
                    &input,
                    Expression::call(
                        "get_input",
                        vec![Expression::string("enter new location: ")],
                    ),
                )),
                Statement::if_(
                    ne(cell(Expression::var(&input)), blank()),
                    vec![
                        write(vec![Expression::string("that space is already taken\n")]),
                        Statement::Continue,
                    ],
                ),
                Statement::expr(Expression::array_set(
                    &board,
                    Expression::var(&input),
                    Expression::var(&current),
                )),
                Statement::Break,
            ],
        ),
    ));

    // check_win_single(p, q, r): the owner of a full line, else " "
    let p = b.variable("p", Type::Integer);
    let q = b.variable("q", Type::Integer);
    let r = b.variable("r", Type::Integer);
    let at = |v| cell(Expression::var(v));
    b.add_function(
        FunctionDecl::new("check_win_single")
            .param(&p)
            .param(&q)
            .param(&r)
            .statements([
                Statement::if_(
                    eq(at(&p), at(&q)),
                    vec![Statement::if_(
                        eq(at(&q), at(&r)),
                        vec![Statement::if_(
                            ne(at(&p), blank()),
                            vec![Statement::ret(Some(at(&p)))],
                        )],
                    )],
                ),
                Statement::ret(Some(blank())),
            ]),
    );

    // check_win(): first winning line's owner, else " "
    let result = b.variable("result", Type::String);
    let mut body = Vec::new();
    for line in LINES {
        body.push(Statement::expr(Expression::assign(
            &result,
            Expression::call(
                "check_win_single",
                line.iter().map(|&c| Expression::int(c)).collect(),
            ),
        )));
        body.push(Statement::if_(
            ne(Expression::var(&result), blank()),
            vec![Statement::ret(Some(Expression::var(&result)))],
        ));
    }
    body.push(Statement::ret(Some(blank())));
    b.add_function(FunctionDecl::new("check_win").local(&result).statements(body));

    let next = b.variable("next", Type::String);
    let winner = b.variable("winner", Type::String);
    b.add_function(FunctionDecl::new("main").local(&next).local(&winner).statements([
        call("reset", vec![]),
        Statement::while_(
            Expression::boolean(true),
            vec![
                call("print_board", vec![]),
                call("do_turn", vec![Expression::var(&turn)]),
                Statement::if_(
                    eq(Expression::var(&turn), Expression::string("X")),
                    vec![Statement::expr(Expression::assign(&next, Expression::string("O")))],
                ),
                Statement::if_(
                    eq(Expression::var(&turn), Expression::string("O")),
                    vec![Statement::expr(Expression::assign(&next, Expression::string("X")))],
                ),
                Statement::expr(Expression::assign(&turn, Expression::var(&next))),
                Statement::expr(Expression::assign(
                    &winner,
                    Expression::call("check_win", vec![]),
                )),
                Statement::if_(
                    ne(Expression::var(&winner), blank()),
                    vec![
                        call("print_board", vec![]),
                        write(vec![Expression::var(&winner), Expression::string(" Wins\n\n")]),
                        Statement::ret(None),
                    ],
                ),
            ],
        ),
    ]));
    b.finish()
}
